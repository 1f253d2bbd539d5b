//! Balance snapshot command

use anyhow::{Context, Result};
use chrono::Utc;
use firefeed_core::ledger::Ledger;
use firefeed_core::{run_snapshot, Config, FireflyClient, SnapshotSummary};

use super::open_db;

/// Mirror the balances of `ledger` into the configured database
pub async fn snapshot_with(config: &Config, ledger: &dyn Ledger) -> Result<SnapshotSummary> {
    let db = open_db(config)?;
    run_snapshot(ledger, &db, Utc::now())
        .await
        .context("Snapshot failed")
}

pub async fn cmd_snapshot(config: &Config) -> Result<()> {
    println!("📸 Taking balance snapshot...");

    let ledger = FireflyClient::from_config(config).context("Ledger client not configured")?;
    let summary = snapshot_with(config, &ledger).await?;

    println!("   Inserted: {}", summary.inserted);
    println!("   Updated:  {}", summary.updated);
    println!("   Deleted:  {}", summary.deleted);
    println!("✅ Recorded {} daily balances", summary.daily);

    Ok(())
}
