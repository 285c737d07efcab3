//! Access list snapshot types and the provider interface
//! The updater reads these once per cycle; nothing here outlives a cycle

use anyhow::Result;
use async_trait::async_trait;

/// Caller visibility for provider queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Unrestricted system visibility, bypassing per-user filtering
    All,
    /// Rows owned by the named user only
    User(String),
}

/// Explicit caller context passed to the provider.
///
/// The background updater runs as an internal process and uses the system
/// context rather than impersonating a user session.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub visibility: Visibility,
}

impl AccessContext {
    /// Internal system caller with unrestricted visibility
    pub fn system() -> Self {
        Self {
            visibility: Visibility::All,
        }
    }

    pub fn user(name: &str) -> Self {
        Self {
            visibility: Visibility::User(name.to_string()),
        }
    }
}

/// One row of the lightweight listing returned by `get_all`
#[derive(Debug, Clone)]
pub struct AccessListSummary {
    pub id: String,
    pub proxy_host_count: i64,
}

/// A client address/directive rule inside an access list
#[derive(Debug, Clone)]
pub struct ClientEntry {
    pub address: String,
    pub directive: String,
}

/// A reverse-proxy host referencing an access list
#[derive(Debug, Clone)]
pub struct ProxyHost {
    pub id: String,
    pub enabled: bool,
    pub domain_names: Vec<String>,
}

/// Full per-cycle snapshot of one access list with its clients and hosts
#[derive(Debug, Clone)]
pub struct AccessList {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub clients: Vec<ClientEntry>,
    pub proxy_hosts: Vec<ProxyHost>,
}

/// Data-access boundary for access lists
#[async_trait]
pub trait AccessListProvider: Send + Sync {
    /// List all access lists with their associated host counts
    async fn get_all(&self, ctx: &AccessContext) -> Result<Vec<AccessListSummary>>;

    /// Fetch one access list expanded with owner, clients and proxy hosts.
    /// `skip_masking` returns rows unredacted for internal consumers.
    async fn get(&self, ctx: &AccessContext, id: &str, skip_masking: bool) -> Result<AccessList>;
}
