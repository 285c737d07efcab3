//! SQLite-backed access list store
//! Implements the provider interface the updater reads once per cycle

use crate::access_lists::{
    AccessContext, AccessList, AccessListProvider, AccessListSummary, ClientEntry, ProxyHost,
    Visibility,
};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// An access list row as stored, without its expansions
#[derive(Debug, Clone)]
pub struct AccessListRow {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Thread-safe store for access lists, their clients and their proxy hosts.
/// Uses a Mutex so only one thread touches the connection at a time.
pub struct DatabaseManager {
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseManager {
    /// Open (and initialize) the database at the given path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        manager.initialize()?;

        Ok(manager)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS access_lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS access_list_clients (
                id TEXT PRIMARY KEY,
                access_list_id TEXT NOT NULL,
                address TEXT NOT NULL,
                directive TEXT NOT NULL DEFAULT 'allow'
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS proxy_hosts (
                id TEXT PRIMARY KEY,
                access_list_id TEXT NOT NULL,
                domain_names TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_clients_access_list
             ON access_list_clients(access_list_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_hosts_access_list
             ON proxy_hosts(access_list_id)",
            [],
        )?;

        Ok(())
    }

    /// Create an access list
    pub fn add_access_list(&self, name: &str, owner: &str) -> Result<AccessListRow> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO access_lists (id, name, owner) VALUES (?1, ?2, ?3)",
            params![id, name, owner],
        )?;

        Ok(AccessListRow {
            id,
            name: name.to_string(),
            owner: owner.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Add a client rule to an access list
    pub fn add_client(&self, access_list_id: &str, address: &str, directive: &str) -> Result<String> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO access_list_clients (id, access_list_id, address, directive)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, access_list_id, address, directive],
        )?;

        Ok(id)
    }

    /// Attach a proxy host to an access list
    pub fn add_proxy_host(
        &self,
        access_list_id: &str,
        domain_names: &[String],
        enabled: bool,
    ) -> Result<String> {
        let conn = self.conn.lock();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO proxy_hosts (id, access_list_id, domain_names, enabled)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, access_list_id, domain_names.join(","), enabled as i32],
        )?;

        Ok(id)
    }

    /// Enable or disable a proxy host
    pub fn set_host_enabled(&self, host_id: &str, enabled: bool) -> Result<bool> {
        let conn = self.conn.lock();

        let affected = conn.execute(
            "UPDATE proxy_hosts SET enabled = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![enabled as i32, host_id],
        )?;

        Ok(affected > 0)
    }

    /// Delete an access list together with its clients and hosts
    pub fn delete_access_list(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();

        conn.execute(
            "DELETE FROM access_list_clients WHERE access_list_id = ?1",
            params![id],
        )?;
        conn.execute(
            "DELETE FROM proxy_hosts WHERE access_list_id = ?1",
            params![id],
        )?;
        let affected = conn.execute("DELETE FROM access_lists WHERE id = ?1", params![id])?;

        Ok(affected > 0)
    }

    /// List all access list rows, optionally filtered by owner
    pub fn list_access_lists(&self, owner: Option<&str>) -> Result<Vec<AccessListRow>> {
        let conn = self.conn.lock();

        let sql = if owner.is_some() {
            "SELECT id, name, owner, created_at, updated_at
             FROM access_lists WHERE owner = ?1 ORDER BY name"
        } else {
            "SELECT id, name, owner, created_at, updated_at
             FROM access_lists ORDER BY name"
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = if let Some(o) = owner {
            stmt.query(params![o])?
        } else {
            stmt.query([])?
        };

        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            lists.push(AccessListRow {
                id: row.get(0)?,
                name: row.get(1)?,
                owner: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            });
        }

        Ok(lists)
    }

    fn load_clients(conn: &Connection, access_list_id: &str) -> Result<Vec<ClientEntry>> {
        let mut stmt = conn.prepare(
            "SELECT address, directive FROM access_list_clients WHERE access_list_id = ?1",
        )?;

        let mut rows = stmt.query(params![access_list_id])?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(ClientEntry {
                address: row.get(0)?,
                directive: row.get(1)?,
            });
        }

        Ok(clients)
    }

    fn load_proxy_hosts(conn: &Connection, access_list_id: &str) -> Result<Vec<ProxyHost>> {
        let mut stmt = conn.prepare(
            "SELECT id, domain_names, enabled FROM proxy_hosts WHERE access_list_id = ?1",
        )?;

        let mut rows = stmt.query(params![access_list_id])?;
        let mut hosts = Vec::new();
        while let Some(row) = rows.next()? {
            let domains: String = row.get(1)?;
            hosts.push(ProxyHost {
                id: row.get(0)?,
                domain_names: domains
                    .split(',')
                    .filter(|d| !d.is_empty())
                    .map(|d| d.to_string())
                    .collect(),
                enabled: row.get::<_, i32>(2)? != 0,
            });
        }

        Ok(hosts)
    }
}

#[async_trait]
impl AccessListProvider for DatabaseManager {
    async fn get_all(&self, ctx: &AccessContext) -> Result<Vec<AccessListSummary>> {
        let conn = self.conn.lock();

        let (sql, owner) = match &ctx.visibility {
            Visibility::All => (
                "SELECT al.id, COUNT(ph.id)
                 FROM access_lists al
                 LEFT JOIN proxy_hosts ph ON ph.access_list_id = al.id
                 GROUP BY al.id",
                None,
            ),
            Visibility::User(name) => (
                "SELECT al.id, COUNT(ph.id)
                 FROM access_lists al
                 LEFT JOIN proxy_hosts ph ON ph.access_list_id = al.id
                 WHERE al.owner = ?1
                 GROUP BY al.id",
                Some(name.as_str()),
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let mut rows = if let Some(o) = owner {
            stmt.query(params![o])?
        } else {
            stmt.query([])?
        };

        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(AccessListSummary {
                id: row.get(0)?,
                proxy_host_count: row.get(1)?,
            });
        }

        Ok(summaries)
    }

    async fn get(&self, ctx: &AccessContext, id: &str, skip_masking: bool) -> Result<AccessList> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT id, name, owner FROM access_lists WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let (id, name, owner) = match row {
            Some(r) => r,
            None => anyhow::bail!("access list '{}' not found", id),
        };

        if let Visibility::User(caller) = &ctx.visibility {
            if caller != &owner {
                anyhow::bail!("access list '{}' is not visible to '{}'", id, caller);
            }
        }

        let clients = Self::load_clients(&conn, &id)?;
        let proxy_hosts = Self::load_proxy_hosts(&conn, &id)?;

        Ok(AccessList {
            id,
            name,
            // Internal consumers read rows unredacted
            owner: if skip_masking { owner } else { String::from("[masked]") },
            clients,
            proxy_hosts,
        })
    }
}
