//! Periodic reconciliation of dynamic hostnames in access-list clients
//! Detects IP changes and triggers one batched config regeneration + reload

use crate::access_lists::{AccessContext, AccessList, AccessListProvider, ProxyHost};
use crate::nginx::HostConfigGenerator;
use crate::resolver::{requires_resolution, Resolver};
use anyhow::{Context, Result};
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters from one completed reconciliation cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub addresses_in_use: usize,
    pub addresses_changed: usize,
    pub hosts_regenerated: usize,
}

/// Clears the reentrancy flag on every exit path, including unwinding
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs reconciliation cycles over the access-list graph.
///
/// At most one cycle runs at a time; a trigger arriving while a cycle is in
/// flight is dropped, not queued.
pub struct Updater {
    resolver: Arc<Resolver>,
    provider: Arc<dyn AccessListProvider>,
    generator: Arc<dyn HostConfigGenerator>,
    running: AtomicBool,
}

impl Updater {
    pub fn new(
        resolver: Arc<Resolver>,
        provider: Arc<dyn AccessListProvider>,
        generator: Arc<dyn HostConfigGenerator>,
    ) -> Self {
        Self {
            resolver,
            provider,
            generator,
            running: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Returns `Ok(None)` when a cycle is already in flight. Fetch and
    /// regeneration failures propagate and abort the remainder of the cycle;
    /// the reentrancy flag is released on every exit path so the next
    /// scheduled trigger is unaffected.
    pub async fn check_for_updates(&self) -> Result<Option<CycleStats>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Skipping since previous DDNS update check is in progress");
            return Ok(None);
        }
        let _guard = CycleGuard(&self.running);

        info!("Checking for DDNS updates...");
        let stats = self.run_cycle().await?;
        info!(
            "Finished checking for DDNS updates ({} address(es) in use, {} changed, {} host(s) regenerated)",
            stats.addresses_in_use, stats.addresses_changed, stats.hosts_regenerated
        );

        Ok(Some(stats))
    }

    async fn run_cycle(&self) -> Result<CycleStats> {
        let snapshots = self
            .fetch_access_lists()
            .await
            .context("failed to fetch access lists")?;

        // Map of domain-shaped client address -> access lists using it.
        // Lists with no associated hosts are skipped entirely; nothing
        // downstream needs their resolution.
        let mut used_addresses: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, list) in snapshots.iter().enumerate() {
            if list.proxy_hosts.is_empty() {
                continue;
            }
            for client in &list.clients {
                if !requires_resolution(&client.address) {
                    continue;
                }
                used_addresses
                    .entry(client.address.clone())
                    .or_default()
                    .push(idx);
            }
        }
        info!("Found {} address(es) in use", used_addresses.len());

        self.resolver
            .prune(|host| used_addresses.contains_key(host));

        // Forced re-resolution of every address in use, concurrently, with
        // the previous cached value captured before the refresh. The diff
        // below only runs once all resolutions have settled.
        let resolutions = used_addresses.keys().map(|address| {
            let previous = self.resolver.cached_address(address).unwrap_or_default();
            let address = address.clone();
            async move {
                let resolved = self.resolver.resolve(&address, true).await;
                (address, previous, resolved)
            }
        });
        let resolutions = join_all(resolutions).await;

        let mut updated_addresses: HashMap<String, &Vec<usize>> = HashMap::new();
        for (address, previous, resolved) in &resolutions {
            if resolved != address && resolved != previous {
                updated_addresses.insert(address.clone(), &used_addresses[address]);
            }
        }
        info!("{} DDNS IP(s) updated", updated_addresses.len());

        // Dedupe by access list first, then by host, so a host reachable
        // through two changed addresses is regenerated once.
        let mut seen_lists: HashSet<&str> = HashSet::new();
        let mut seen_hosts: HashSet<&str> = HashSet::new();
        let mut proxy_hosts: Vec<ProxyHost> = Vec::new();
        for indices in updated_addresses.values() {
            for &idx in indices.iter() {
                let list = &snapshots[idx];
                if !seen_lists.insert(&list.id) {
                    continue;
                }
                for host in &list.proxy_hosts {
                    if host.enabled && seen_hosts.insert(&host.id) {
                        proxy_hosts.push(host.clone());
                    }
                }
            }
        }

        let stats = CycleStats {
            addresses_in_use: used_addresses.len(),
            addresses_changed: updated_addresses.len(),
            hosts_regenerated: proxy_hosts.len(),
        };

        if !proxy_hosts.is_empty() {
            info!(
                "Updating {} proxy host(s) affected by DDNS changes",
                proxy_hosts.len()
            );
            self.generator
                .bulk_generate_configs("proxy_host", &proxy_hosts)
                .await
                .context("bulk config generation failed")?;
            self.generator.reload().await.context("reload failed")?;
        }

        Ok(stats)
    }

    /// Fetch all access lists expanded with clients and hosts, using the
    /// internal system context (no per-user filtering, no masking).
    async fn fetch_access_lists(&self) -> Result<Vec<AccessList>> {
        let ctx = AccessContext::system();
        let summaries = self.provider.get_all(&ctx).await?;

        let fetches = summaries
            .iter()
            .map(|summary| self.provider.get(&ctx, &summary.id, true));

        join_all(fetches).await.into_iter().collect()
    }
}
