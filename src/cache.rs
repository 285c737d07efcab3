//! In-memory cache of resolved dynamic hostnames
//! Maps a hostname to its last known IPv4 address and resolution time

use std::collections::HashMap;
use std::time::Instant;

/// A single cached resolution
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub address: String,
    pub last_updated: Instant,
}

/// Hostname -> resolved address cache
///
/// Not synchronized internally: the resolver owns it behind a mutex and all
/// mutation happens on one logical flow per cycle. Entries are written only
/// on successful resolution and removed only by the updater's prune step.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: HashMap<String, CacheEntry>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up the entry for a hostname
    pub fn get(&self, hostname: &str) -> Option<&CacheEntry> {
        self.entries.get(hostname)
    }

    /// Insert or overwrite the entry for a hostname
    pub fn set(&mut self, hostname: &str, address: &str, last_updated: Instant) {
        self.entries.insert(
            hostname.to_string(),
            CacheEntry {
                address: address.to_string(),
                last_updated,
            },
        );
    }

    /// Remove the entry for a hostname, if present
    pub fn delete(&mut self, hostname: &str) {
        self.entries.remove(hostname);
    }

    /// Snapshot of all cached hostname keys
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
