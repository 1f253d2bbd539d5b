//! ZEN.com CSV statements
//!
//! Columns: date (`27-Apr-23`), type label, description, settlement amount,
//! settlement currency, original amount, original currency, ...

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::{cell, join_cells, parse_amount, read_csv_row, split_csv_rows, Parser};
use crate::error::{RecordError, Result};
use crate::models::{Record, Transaction, TransactionSource, TransactionType};

const DATE_FORMAT: &str = "%d-%b-%y";
const EXCHANGE_LABEL: &str = "exchange money";

pub struct ZenParser;

impl ZenParser {
    /// One row yields one transaction, plus a settlement-difference expense
    /// for incomes that settled for less or more than the original amount.
    fn parse_record(&self, record: &Record) -> std::result::Result<Vec<Transaction>, RecordError> {
        let row = read_csv_row(record.payload.as_bytes())?;

        let raw_date = cell(&row, 0)?.trim_start_matches(|c: char| !c.is_ascii_graphic());
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|_| RecordError::parse(format!("invalid date: {}", raw_date)))?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| RecordError::parse(format!("invalid date: {}", raw_date)))?
            .and_utc();

        let label = cell(&row, 1)?.to_string();
        let description = cell(&row, 2)?.to_string();
        let settlement_amount = parse_amount(cell(&row, 3)?)?;
        let settlement_currency = cell(&row, 4)?.to_uppercase();
        let original_amount = parse_amount(cell(&row, 5)?)?;
        let original_currency = cell(&row, 6)?.to_uppercase();

        let mut tx = Transaction::from_record(record);
        tx.date = date;
        tx.description = description.clone();
        tx.original_tx_type = label.clone();
        tx.deduplication_key = join_cells(row.iter());

        if label.to_lowercase() == EXCHANGE_LABEL {
            tx.kind = TransactionType::InternalTransfer;
            tx.source_amount = settlement_amount.abs();
            tx.source_currency = settlement_currency.clone();
            tx.source_account = self.account_name(&settlement_currency);
            tx.destination_amount = original_amount.abs();
            tx.destination_currency = original_currency.clone();
            tx.destination_account = self.account_name(&original_currency);
            return Ok(vec![tx]);
        }

        if settlement_amount < Decimal::ZERO {
            // Booked in the original currency; the settled amount rides along
            tx.kind = TransactionType::Expense;
            tx.source_amount = original_amount.abs();
            tx.source_currency = original_currency.clone();
            tx.source_account = self.account_name(&original_currency);
            tx.destination_amount = settlement_amount.abs();
            tx.destination_currency = settlement_currency;
            return Ok(vec![tx]);
        }

        if settlement_amount == Decimal::ZERO {
            return Err(RecordError::parse("zero settlement amount"));
        }

        tx.kind = TransactionType::Income;
        tx.destination_amount = settlement_amount;
        tx.destination_currency = original_currency.clone();
        tx.destination_account = self.account_name(&original_currency);

        let diff = (original_amount.abs() - settlement_amount).abs();
        if diff.is_zero() {
            return Ok(vec![tx]);
        }

        let mut fee = Transaction::from_record(record);
        fee.kind = TransactionType::Expense;
        fee.date = date;
        fee.original_tx_type = label;
        fee.source_amount = diff;
        fee.source_currency = original_currency.clone();
        fee.source_account = self.account_name(&original_currency);
        fee.description = format!(
            "settlement diff for {}. and original desc {}",
            tx.id, description
        );
        fee.deduplication_key = format!("{}_settlement_diff", tx.deduplication_key);

        Ok(vec![tx, fee])
    }
}

impl Parser for ZenParser {
    fn source(&self) -> TransactionSource {
        TransactionSource::Zen
    }

    fn supports_split(&self) -> bool {
        true
    }

    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        split_csv_rows(data)
    }

    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::with_capacity(records.len());
        for record in records {
            match self.parse_record(record) {
                Ok(txs) => transactions.extend(txs),
                Err(err) => transactions.push(Transaction::failed(record, err)),
            }
        }

        debug!("Parsed {} zen transactions", transactions.len());
        Ok(transactions)
    }
}
