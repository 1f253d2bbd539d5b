//! Account balance snapshots
//!
//! Mirrors the ledger's account balances into `simple_account_data_importer`
//! and keeps one row per account per UTC day in the daily table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::{BalanceRow, Database};
use crate::error::Result;
use crate::ledger::Ledger;

/// What a snapshot run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub daily: usize,
}

/// Diff the ledger's balances against the stored rows and apply the changes
///
/// Accounts without a balance or currency are not tracked.
pub async fn run_snapshot(
    ledger: &dyn Ledger,
    db: &Database,
    now: DateTime<Utc>,
) -> Result<SnapshotSummary> {
    let accounts = ledger.list_accounts().await?;
    let upstream: Vec<BalanceRow> = accounts
        .into_iter()
        .filter_map(|a| {
            Some(BalanceRow {
                balance: a.current_balance?,
                currency_id: a.currency_id?,
                id: a.id,
                updated_at: now,
            })
        })
        .collect();

    let existing: HashMap<String, BalanceRow> = db
        .list_balances()?
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();

    let mut summary = SnapshotSummary::default();

    for id in existing.keys() {
        if !upstream.iter().any(|row| &row.id == id) {
            db.delete_balance(id)?;
            summary.deleted += 1;
        }
    }

    let today = now.date_naive();
    for row in &upstream {
        match existing.get(&row.id) {
            None => {
                db.upsert_balance(row)?;
                summary.inserted += 1;
            }
            Some(old) if old.balance != row.balance || old.currency_id != row.currency_id => {
                db.upsert_balance(row)?;
                summary.updated += 1;
            }
            Some(_) => debug!(account = %row.id, "Balance unchanged"),
        }
        db.upsert_daily_balance(row, today)?;
        summary.daily += 1;
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        deleted = summary.deleted,
        daily = summary.daily,
        "Balance snapshot complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::test_utils::MockLedger;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn account(id: &str, balance: i64) -> Account {
        Account {
            id: id.into(),
            name: format!("acc {}", id),
            account_number: String::new(),
            current_balance: Some(Decimal::new(balance, 2)),
            currency_id: Some("1".into()),
        }
    }

    #[tokio::test]
    async fn test_snapshot_diff() {
        let db = Database::in_memory().unwrap();
        let ledger = MockLedger::new(vec![account("1", 100), account("2", 200)]);
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

        let first = run_snapshot(&ledger, &db, day1).await.unwrap();
        assert_eq!(
            first,
            SnapshotSummary {
                inserted: 2,
                updated: 0,
                deleted: 0,
                daily: 2
            }
        );

        ledger.set_accounts(vec![account("1", 150), account("3", 300)]);
        let later = day1 + Duration::hours(1);
        let second = run_snapshot(&ledger, &db, later).await.unwrap();
        assert_eq!(second.inserted, 1);
        assert_eq!(second.updated, 1);
        assert_eq!(second.deleted, 1);

        let rows = db.list_balances().unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(rows[0].balance, Decimal::new(150, 2));

        // Same day: daily rows are upserted, account 2 keeps its earlier row
        let daily = db.daily_balances(day1.date_naive()).unwrap();
        assert_eq!(daily.len(), 3);
    }

    #[tokio::test]
    async fn test_unchanged_rows_untouched() {
        let db = Database::in_memory().unwrap();
        let ledger = MockLedger::new(vec![account("1", 100)]);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        run_snapshot(&ledger, &db, t0).await.unwrap();

        let summary = run_snapshot(&ledger, &db, t0 + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(db.list_balances().unwrap()[0].updated_at, t0);
        assert_eq!(
            db.daily_balances((t0 + Duration::days(1)).date_naive())
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_accounts_without_balance_skipped() {
        let db = Database::in_memory().unwrap();
        let mut bare = account("9", 0);
        bare.current_balance = None;
        let ledger = MockLedger::new(vec![bare]);
        let summary = run_snapshot(&ledger, &db, Utc::now()).await.unwrap();
        assert_eq!(summary, SnapshotSummary::default());
    }
}
