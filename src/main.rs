//! DdnsWatch - Main entry point
//!
//! Background daemon that keeps reverse-proxy configs in sync with
//! dynamic-DNS access-list client addresses

use anyhow::Result;
use clap::Parser;
use ddnswatch::{
    update_interval, CommandGenerator, DatabaseManager, Resolver, Scheduler, SystemLookup, Updater,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// DdnsWatch - DDNS cache and reload trigger for reverse-proxy hosts
#[derive(Parser, Debug)]
#[command(name = "ddnswatch")]
#[command(author = "DdnsWatch Contributors")]
#[command(version = "1.0.0")]
#[command(about = "Watch dynamic-DNS access-list clients and reload on change")]
struct Args {
    /// Database path
    #[arg(long, env = "DB_PATH", default_value = "./data/current.db")]
    db_path: PathBuf,

    /// Update interval in seconds (minimum 60, default 3600)
    #[arg(long, env = "DDNS_UPDATE_INTERVAL")]
    update_interval: Option<String>,

    /// Delay in seconds before the warmup cycle
    #[arg(long, env = "DDNS_WARMUP_DELAY",
          default_value_t = ddnswatch::scheduler::WARMUP_DELAY_SECS)]
    warmup_delay: u64,

    /// Command to regenerate host configs, given the host type and ids
    /// (e.g. --generate-cmd /usr/local/bin/render-configs)
    #[arg(long, env = "DDNS_GENERATE_CMD", num_args = 1.., value_delimiter = ' ')]
    generate_cmd: Option<Vec<String>>,

    /// Command to reload the reverse proxy
    #[arg(long, env = "DDNS_RELOAD_CMD", num_args = 1.., value_delimiter = ' ',
          default_values_t = vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()])]
    reload_cmd: Vec<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting DdnsWatch v1.0.0");

    let interval = update_interval(args.update_interval.as_deref());
    info!("Update interval: {}s", interval.as_secs());

    // Initialize the access list store
    let db_manager = Arc::new(DatabaseManager::new(&args.db_path)?);
    info!("Database initialized at: {}", args.db_path.display());

    // The staleness window tracks the update interval, as the cache is only
    // refreshed by the cycle itself
    let resolver = Arc::new(Resolver::new(Arc::new(SystemLookup), interval));

    let generator = Arc::new(CommandGenerator::new(args.generate_cmd, args.reload_cmd));

    let updater = Arc::new(Updater::new(resolver, db_manager, generator));

    let scheduler = Scheduler::new(
        updater,
        interval,
        Duration::from_secs(args.warmup_delay),
    );
    let (_ticker, _warmup) = scheduler.spawn();

    info!("DdnsWatch started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
