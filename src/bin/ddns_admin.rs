//! CLI tool for managing access lists, clients and proxy hosts
//!
//! Usage:
//!   ddnswatch-admin add-list <name> [--owner <owner>]
//!   ddnswatch-admin add-client <list-id> <address> [--directive deny]
//!   ddnswatch-admin add-host <list-id> <domains>... [--disabled]
//!   ddnswatch-admin list [--owner <owner>] [--json]
//!   ddnswatch-admin delete <list-id>
//!   ddnswatch-admin set-host <host-id> --enabled <true|false>

use anyhow::Result;
use clap::{Parser, Subcommand};
use ddnswatch::{AccessContext, AccessListProvider, DatabaseManager};
use std::path::PathBuf;

/// CLI tool for managing DdnsWatch access lists
#[derive(Parser, Debug)]
#[command(name = "ddnswatch-admin")]
#[command(author = "DdnsWatch Contributors")]
#[command(version = "1.0.0")]
#[command(about = "Manage access lists for DdnsWatch")]
struct Args {
    /// Database path
    #[arg(long, env = "DB_PATH", default_value = "./data/current.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new access list
    AddList {
        /// Access list name
        name: String,

        /// Owning user
        #[arg(short = 'o', long, default_value = "admin")]
        owner: String,
    },

    /// Add a client rule to an access list
    AddClient {
        /// Access list id
        list_id: String,

        /// Client address (IP literal, CIDR, or dynamic hostname)
        address: String,

        /// allow or deny
        #[arg(short = 'd', long, default_value = "allow")]
        directive: String,
    },

    /// Attach a proxy host to an access list
    AddHost {
        /// Access list id
        list_id: String,

        /// Domain names served by the host
        #[arg(required = true)]
        domains: Vec<String>,

        /// Create the host disabled
        #[arg(long)]
        disabled: bool,
    },

    /// List access lists with their clients and hosts
    List {
        /// Filter by owner
        #[arg(short = 'o', long)]
        owner: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an access list with its clients and hosts
    Delete {
        /// Access list id
        list_id: String,
    },

    /// Enable or disable a proxy host
    SetHost {
        /// Proxy host id
        host_id: String,

        /// New enabled state
        #[arg(long)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let db = DatabaseManager::new(&args.db_path)?;

    match args.command {
        Commands::AddList { name, owner } => {
            let row = db.add_access_list(&name, &owner)?;
            println!("Added access list:");
            println!("  ID:      {}", row.id);
            println!("  Name:    {}", row.name);
            println!("  Owner:   {}", row.owner);
            println!("  Created: {}", row.created_at);
        }

        Commands::AddClient {
            list_id,
            address,
            directive,
        } => {
            let id = db.add_client(&list_id, &address, &directive)?;
            println!("Added client {} ({} {})", id, directive, address);
            if ddnswatch::requires_resolution(&address) {
                println!("  (dynamic hostname, will be resolved on each cycle)");
            }
        }

        Commands::AddHost {
            list_id,
            domains,
            disabled,
        } => {
            let id = db.add_proxy_host(&list_id, &domains, !disabled)?;
            println!(
                "Added proxy host {} for {} ({})",
                id,
                domains.join(", "),
                if disabled { "disabled" } else { "enabled" }
            );
        }

        Commands::List { owner, json } => {
            let rows = db.list_access_lists(owner.as_deref())?;

            if rows.is_empty() {
                println!("No access lists found");
                return Ok(());
            }

            let ctx = AccessContext::system();

            if json {
                let mut output = Vec::new();
                for row in &rows {
                    let snapshot = db.get(&ctx, &row.id, true).await?;
                    output.push(serde_json::json!({
                        "id": snapshot.id,
                        "name": snapshot.name,
                        "owner": snapshot.owner,
                        "clients": snapshot.clients.iter().map(|c| {
                            serde_json::json!({
                                "address": c.address,
                                "directive": c.directive,
                            })
                        }).collect::<Vec<_>>(),
                        "proxy_hosts": snapshot.proxy_hosts.iter().map(|h| {
                            serde_json::json!({
                                "id": h.id,
                                "enabled": h.enabled,
                                "domain_names": h.domain_names,
                            })
                        }).collect::<Vec<_>>(),
                    }));
                }
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for row in &rows {
                    let snapshot = db.get(&ctx, &row.id, true).await?;
                    println!("{} [{}] owner={}", snapshot.name, snapshot.id, snapshot.owner);
                    for client in &snapshot.clients {
                        println!("  client: {} {}", client.directive, client.address);
                    }
                    for host in &snapshot.proxy_hosts {
                        println!(
                            "  host:   {} [{}] {}",
                            host.domain_names.join(", "),
                            host.id,
                            if host.enabled { "enabled" } else { "disabled" }
                        );
                    }
                }
                println!("\nTotal: {} access list(s)", rows.len());
            }
        }

        Commands::Delete { list_id } => {
            if db.delete_access_list(&list_id)? {
                println!("Deleted access list {}", list_id);
            } else {
                eprintln!("No access list found with id {}", list_id);
                std::process::exit(1);
            }
        }

        Commands::SetHost { host_id, enabled } => {
            if db.set_host_enabled(&host_id, enabled)? {
                println!(
                    "Proxy host {} is now {}",
                    host_id,
                    if enabled { "enabled" } else { "disabled" }
                );
            } else {
                eprintln!("No proxy host found with id {}", host_id);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
