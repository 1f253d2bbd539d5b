//! Background task scheduler for account balance snapshots
//!
//! Enabled with `FIREFEED_SNAPSHOT_INTERVAL_HOURS` (e.g. "24" for daily).
//! Each tick mirrors the ledger's balances into the snapshot tables.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use firefeed_core::ledger::Ledger;
use firefeed_core::{run_snapshot, Config, Database};

/// Configuration for scheduled snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotScheduleConfig {
    /// Interval between snapshots in hours
    pub interval_hours: u64,
}

impl SnapshotScheduleConfig {
    /// Returns None if scheduling is not configured
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .snapshot_interval_hours
            .filter(|h| *h > 0)
            .map(|interval_hours| Self { interval_hours })
    }
}

/// Start the snapshot scheduler as a background task
pub fn start_snapshot_scheduler(
    ledger: Arc<dyn Ledger>,
    db: Database,
    config: SnapshotScheduleConfig,
) {
    info!(
        "Starting balance snapshot scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_hours * 3600));

        loop {
            // The first tick completes immediately, so a snapshot is taken on startup
            ticker.tick().await;

            info!("Running scheduled balance snapshot...");
            match run_snapshot(ledger.as_ref(), &db, Utc::now()).await {
                Ok(summary) => info!(
                    "Snapshot completed: {} inserted, {} updated, {} deleted",
                    summary.inserted, summary.updated, summary.deleted
                ),
                Err(e) => error!("Scheduled snapshot failed: {}", e),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_set() {
        assert!(SnapshotScheduleConfig::from_config(&Config::default()).is_none());
    }

    #[test]
    fn test_config_zero_disables() {
        let config = Config {
            snapshot_interval_hours: Some(0),
            ..Default::default()
        };
        assert!(SnapshotScheduleConfig::from_config(&config).is_none());
    }

    #[test]
    fn test_config_interval() {
        let config = Config {
            snapshot_interval_hours: Some(24),
            ..Default::default()
        };
        assert_eq!(
            SnapshotScheduleConfig::from_config(&config),
            Some(SnapshotScheduleConfig { interval_hours: 24 })
        );
    }
}
