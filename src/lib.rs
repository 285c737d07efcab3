//! DdnsWatch - Dynamic-DNS resolution cache and reload trigger
//!
//! Watches the dynamic hostnames referenced by access-list client entries,
//! providing:
//! - A TTL'd hostname -> IPv4 cache with fail-soft resolution
//! - Periodic re-resolution and IP change detection
//! - Batched, deduplicated config regeneration + reload on change
//! - SQLite-backed access list storage with an admin CLI

pub mod access_lists;
pub mod cache;
pub mod database;
pub mod nginx;
pub mod resolver;
pub mod scheduler;
pub mod updater;

pub use access_lists::{AccessContext, AccessList, AccessListProvider, AccessListSummary, ProxyHost};
pub use cache::{AddressCache, CacheEntry};
pub use database::DatabaseManager;
pub use nginx::{CommandGenerator, HostConfigGenerator};
pub use resolver::{requires_resolution, HostLookup, Resolver, SystemLookup};
pub use scheduler::{update_interval, Scheduler};
pub use updater::{CycleStats, Updater};
