//! Account balance snapshot tables

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::Database;
use crate::error::{Error, Result};

/// One row of `simple_account_data_importer`
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub id: String,
    pub balance: Decimal,
    pub currency_id: String,
    pub updated_at: DateTime<Utc>,
}

fn parse_balance(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::InvalidData(format!("bad balance {}: {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("bad timestamp {}: {}", s, e)))
}

impl Database {
    /// Current balance rows, ordered by account id
    pub fn list_balances(&self) -> Result<Vec<BalanceRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, balance, currency_id, updated_at FROM simple_account_data_importer ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, balance, currency_id, updated_at)| {
                Ok(BalanceRow {
                    id,
                    balance: parse_balance(&balance)?,
                    currency_id,
                    updated_at: parse_timestamp(&updated_at)?,
                })
            })
            .collect()
    }

    pub fn upsert_balance(&self, row: &BalanceRow) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO simple_account_data_importer (id, balance, currency_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                balance = excluded.balance,
                currency_id = excluded.currency_id,
                updated_at = excluded.updated_at
            "#,
            params![
                row.id,
                row.balance.to_string(),
                row.currency_id,
                row.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn delete_balance(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM simple_account_data_importer WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Upsert the per-day row keyed by `(id, date)`
    pub fn upsert_daily_balance(&self, row: &BalanceRow, date: NaiveDate) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO simple_account_data_importer_daily (id, date, balance, currency_id, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id, date) DO UPDATE SET
                balance = excluded.balance,
                currency_id = excluded.currency_id,
                updated_at = excluded.updated_at
            "#,
            params![
                row.id,
                date.format("%Y-%m-%d").to_string(),
                row.balance.to_string(),
                row.currency_id,
                row.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Daily rows for one date, ordered by account id
    pub fn daily_balances(&self, date: NaiveDate) -> Result<Vec<BalanceRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, balance, currency_id, updated_at
            FROM simple_account_data_importer_daily
            WHERE date = ?
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, balance, currency_id, updated_at)| {
                Ok(BalanceRow {
                    id,
                    balance: parse_balance(&balance)?,
                    currency_id,
                    updated_at: parse_timestamp(&updated_at)?,
                })
            })
            .collect()
    }
}
