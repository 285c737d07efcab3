//! Hostname resolution with a TTL'd cache and fail-soft error handling
//! Only domain-shaped access-list client addresses are ever resolved

use crate::cache::AddressCache;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Failure modes of the external lookup primitive
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("host lookup failed: {0}")]
    Lookup(#[source] std::io::Error),

    #[error("invalid lookup output for '{0}': no IPv4 address returned")]
    InvalidOutput(String),
}

/// External hostname lookup primitive
///
/// Implementations return the first bound IPv4 address for a hostname.
/// Empty or non-IPv4 output is a failure, never a fallback value.
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Ipv4Addr, LookupError>;
}

/// OS resolver via `tokio::net::lookup_host`, first IPv4 result wins
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> Result<Ipv4Addr, LookupError> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(LookupError::Lookup)?;

        addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| LookupError::InvalidOutput(host.to_string()))
    }
}

/// Checks whether the address requires resolution, i.e. is domain-shaped
/// rather than an IPv4/IPv6 literal or a CIDR network.
pub fn requires_resolution(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() {
        return false;
    }
    if address.parse::<IpAddr>().is_ok() {
        return false;
    }
    // CIDR networks such as 192.168.0.0/24 or fd00::/8
    if let Some((ip, prefix)) = address.split_once('/') {
        if ip.parse::<IpAddr>().is_ok() && prefix.parse::<u8>().is_ok() {
            return false;
        }
    }
    // Domain-shaped: hostname characters with at least one letter, so that
    // malformed numeric literals are not sent to the resolver either
    address.chars().any(|c| c.is_ascii_alphabetic())
        && address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// Resolves dynamic hostnames through the address cache
pub struct Resolver {
    cache: Mutex<AddressCache>,
    lookup: Arc<dyn HostLookup>,
    staleness_window: Duration,
}

impl Resolver {
    /// Create a resolver with an empty cache.
    /// `staleness_window` is how long a cached resolution stays trusted.
    pub fn new(lookup: Arc<dyn HostLookup>, staleness_window: Duration) -> Self {
        Self {
            cache: Mutex::new(AddressCache::new()),
            lookup,
            staleness_window,
        }
    }

    /// Resolve a hostname to its IPv4 address.
    ///
    /// Without `force_update` a cache entry younger than the staleness window
    /// is returned immediately with no lookup call. On lookup or validation
    /// failure the input string is returned unchanged and the cache is left
    /// untouched, so downstream config generation keeps a deterministic,
    /// previously valid value.
    pub async fn resolve(&self, address: &str, force_update: bool) -> String {
        if !force_update {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(address) {
                if entry.last_updated.elapsed() < self.staleness_window {
                    return entry.address.clone();
                }
            }
        }

        self.cache.lock().delete(address);

        // The lookup key is lower-cased while the cache keeps the caller's
        // original case; two spellings of one hostname cache independently.
        let host = address.to_lowercase();
        debug!("Looking up IP for {}", host);

        match self.lookup.lookup(&host).await {
            Ok(ip) => {
                let resolved = ip.to_string();
                info!("Resolved {} to {}", host, resolved);
                self.cache.lock().set(address, &resolved, Instant::now());
                resolved
            }
            Err(e) => {
                error!("Error looking up IP for {}: {}", host, e);
                address.to_string()
            }
        }
    }

    /// Previously cached address for a hostname, if any
    pub fn cached_address(&self, address: &str) -> Option<String> {
        self.cache.lock().get(address).map(|e| e.address.clone())
    }

    /// Remove every cached hostname for which `keep` returns false
    pub fn prune<F>(&self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut cache = self.cache.lock();
        let stale: Vec<String> = cache
            .keys()
            .into_iter()
            .filter(|host| !keep(host))
            .collect();
        for host in &stale {
            cache.delete(host);
        }
        stale.len()
    }

    #[cfg(test)]
    pub(crate) fn cached_hostnames(&self) -> Vec<String> {
        self.cache.lock().keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    /// Scripted lookup that records every host it is asked about
    struct ScriptedLookup {
        result: Option<Ipv4Addr>,
        calls: SyncMutex<Vec<String>>,
    }

    impl ScriptedLookup {
        fn returning(ip: Ipv4Addr) -> Self {
            Self {
                result: Some(ip),
                calls: SyncMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                result: None,
                calls: SyncMutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl HostLookup for ScriptedLookup {
        async fn lookup(&self, host: &str) -> Result<Ipv4Addr, LookupError> {
            self.calls.lock().push(host.to_string());
            self.result
                .ok_or_else(|| LookupError::InvalidOutput(host.to_string()))
        }
    }

    #[test]
    fn test_requires_resolution() {
        assert!(requires_resolution("my.dyndns.example.com"));
        assert!(requires_resolution("host-1.example.com"));
        assert!(requires_resolution("localhost"));

        assert!(!requires_resolution("203.0.113.5"));
        assert!(!requires_resolution("192.168.0.0/24"));
        assert!(!requires_resolution("2001:db8::1"));
        assert!(!requires_resolution("fd00::/8"));
        assert!(!requires_resolution(""));
        assert!(!requires_resolution("   "));
        assert!(!requires_resolution("300.1.2.3"));
    }

    #[tokio::test]
    async fn test_resolve_populates_cache() {
        let lookup = Arc::new(ScriptedLookup::returning(Ipv4Addr::new(10, 0, 0, 5)));
        let resolver = Resolver::new(lookup.clone(), Duration::from_secs(3600));

        let resolved = resolver.resolve("d1.example.com", false).await;

        assert_eq!(resolved, "10.0.0.5");
        assert_eq!(resolver.cached_address("d1.example.com").unwrap(), "10.0.0.5");
        assert_eq!(resolver.cached_hostnames().len(), 1);
    }

    #[tokio::test]
    async fn test_second_resolve_within_window_hits_cache() {
        let lookup = Arc::new(ScriptedLookup::returning(Ipv4Addr::new(10, 0, 0, 5)));
        let resolver = Resolver::new(lookup.clone(), Duration::from_secs(3600));

        let first = resolver.resolve("d1.example.com", false).await;
        let second = resolver.resolve("d1.example.com", false).await;

        assert_eq!(first, second);
        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_force_update_bypasses_window() {
        let lookup = Arc::new(ScriptedLookup::returning(Ipv4Addr::new(10, 0, 0, 5)));
        let resolver = Resolver::new(lookup.clone(), Duration::from_secs(3600));

        resolver.resolve("d1.example.com", false).await;
        resolver.resolve("d1.example.com", true).await;

        assert_eq!(lookup.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_returns_input_and_leaves_cache_alone() {
        let failing = Arc::new(ScriptedLookup::failing());
        let resolver = Resolver::new(failing, Duration::from_secs(3600));

        let resolved = resolver.resolve("d2.example.com", false).await;

        assert_eq!(resolved, "d2.example.com");
        assert!(resolver.cached_address("d2.example.com").is_none());
    }

    #[tokio::test]
    async fn test_lookup_key_is_lowercased_cache_key_is_not() {
        let lookup = Arc::new(ScriptedLookup::returning(Ipv4Addr::new(10, 0, 0, 5)));
        let resolver = Resolver::new(lookup.clone(), Duration::from_secs(3600));

        resolver.resolve("Host.Example.Com", false).await;

        assert_eq!(lookup.calls.lock().as_slice(), ["host.example.com"]);
        assert!(resolver.cached_address("Host.Example.Com").is_some());
        assert!(resolver.cached_address("host.example.com").is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_only_matching_hosts() {
        let lookup = Arc::new(ScriptedLookup::returning(Ipv4Addr::new(10, 0, 0, 5)));
        let resolver = Resolver::new(lookup, Duration::from_secs(3600));

        resolver.resolve("a.example.com", false).await;
        resolver.resolve("b.example.com", false).await;
        resolver.resolve("c.example.com", false).await;

        let removed = resolver.prune(|host| host == "a.example.com" || host == "c.example.com");

        assert_eq!(removed, 1);
        let mut hosts = resolver.cached_hostnames();
        hosts.sort();
        assert_eq!(hosts, vec!["a.example.com", "c.example.com"]);
    }
}
