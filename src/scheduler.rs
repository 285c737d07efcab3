//! Periodic and warmup triggers for the DDNS updater
//! The cache is not persisted, so a warmup run fires shortly after startup

use crate::updater::Updater;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{error, info, warn};

/// Default refresh interval when no override is configured
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Smallest interval an override is clamped to
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Delay before the warmup cycle that populates the initial cache
pub const WARMUP_DELAY_SECS: u64 = 10;

/// Parse the interval override (seconds).
///
/// Unset falls back to the default silently; a non-numeric, non-empty value
/// warns and falls back; anything parsed is clamped to the minimum.
pub fn update_interval(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return Duration::from_secs(DEFAULT_INTERVAL_SECS);
    };

    match raw.trim().parse::<i64>() {
        Ok(secs) => Duration::from_secs((secs.max(MIN_INTERVAL_SECS as i64)) as u64),
        Err(_) => {
            if !raw.trim().is_empty() {
                warn!("Invalid value for DDNS update interval: '{}'", raw);
            }
            Duration::from_secs(DEFAULT_INTERVAL_SECS)
        }
    }
}

/// Fires updater cycles on a fixed interval plus one warmup shot
pub struct Scheduler {
    updater: Arc<Updater>,
    interval: Duration,
    warmup: Duration,
}

impl Scheduler {
    pub fn new(updater: Arc<Updater>, interval: Duration, warmup: Duration) -> Self {
        Self {
            updater,
            interval,
            warmup,
        }
    }

    /// Spawn the repeating ticker and the warmup one-shot.
    ///
    /// Overlap between the two is handled by the updater's reentrancy guard;
    /// a failed cycle is logged and never tears the loop down.
    pub fn spawn(&self) -> (JoinHandle<()>, JoinHandle<()>) {
        info!(
            "DDNS update timer initialized (interval: {}s)",
            self.interval.as_secs()
        );

        let updater = self.updater.clone();
        let period = self.interval;
        let ticker = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                run_cycle(&updater).await;
            }
        });

        let updater = self.updater.clone();
        let warmup = self.warmup;
        let warmup_shot = tokio::spawn(async move {
            sleep(warmup).await;
            run_cycle(&updater).await;
        });

        (ticker, warmup_shot)
    }
}

async fn run_cycle(updater: &Updater) {
    if let Err(e) = updater.check_for_updates().await {
        error!("DDNS update check failed: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_unset_uses_default() {
        assert_eq!(update_interval(None), Duration::from_secs(3600));
    }

    #[test]
    fn test_interval_parsed_value() {
        assert_eq!(update_interval(Some("300")), Duration::from_secs(300));
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        assert_eq!(update_interval(Some("5")), Duration::from_secs(60));
        assert_eq!(update_interval(Some("0")), Duration::from_secs(60));
        assert_eq!(update_interval(Some("-60")), Duration::from_secs(60));
    }

    #[test]
    fn test_interval_non_numeric_falls_back() {
        assert_eq!(update_interval(Some("soon")), Duration::from_secs(3600));
        assert_eq!(update_interval(Some("")), Duration::from_secs(3600));
    }
}
