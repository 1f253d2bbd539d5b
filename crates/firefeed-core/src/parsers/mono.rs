//! Monobank statement CSV export
//!
//! Columns: operation time, description, MCC, card amount, operation amount,
//! operation currency, then exchange rate, commission, cashback and balance.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

use super::{cell, join_cells, parse_amount, read_csv_row, split_csv_rows, Parser};
use crate::error::{RecordError, Result};
use crate::models::{Record, Transaction, TransactionSource, TransactionType};

/// Card currency of the statement. The export does not carry it and only
/// hryvnia card statements are imported.
const SOURCE_CURRENCY: &str = "UAH";

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

pub struct MonoParser;

impl MonoParser {
    fn parse_record(&self, record: &Record) -> std::result::Result<Transaction, RecordError> {
        let row = read_csv_row(record.payload.as_bytes())?;

        let raw_date = cell(&row, 0)?.trim_start_matches(|c: char| !c.is_ascii_graphic());
        let date = NaiveDateTime::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|_| RecordError::parse(format!("invalid operation time: {}", raw_date)))?
            .and_utc();

        let description = cell(&row, 1)?.to_string();
        let mcc = cell(&row, 2)?.to_string();
        let source_amount = parse_amount(cell(&row, 3)?)?;
        let destination_amount = parse_amount(cell(&row, 4)?)?;
        let destination_currency = cell(&row, 5)?.to_uppercase();

        if source_amount > Decimal::ZERO {
            return Err(RecordError::OperationNotSupported(
                "income operations are not supported".into(),
            ));
        }

        let mut tx = Transaction::from_record(record);
        tx.kind = TransactionType::Expense;
        tx.date = date;
        tx.date_from_message = date.format("%H:%M").to_string();
        tx.description = description;
        tx.original_tx_type = mcc;
        tx.source_amount = source_amount.abs();
        tx.source_currency = SOURCE_CURRENCY.to_string();
        tx.source_account = self.account_name(SOURCE_CURRENCY);
        tx.destination_amount = destination_amount.abs();
        tx.destination_currency = destination_currency;
        tx.deduplication_key = join_cells(row.iter());

        Ok(tx)
    }
}

impl Parser for MonoParser {
    fn source(&self) -> TransactionSource {
        TransactionSource::Mono
    }

    fn supports_split(&self) -> bool {
        true
    }

    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        split_csv_rows(data)
    }

    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = records
            .iter()
            .map(|record| {
                self.parse_record(record).unwrap_or_else(|err| {
                    let mut tx = Transaction::failed(record, err);
                    // Keep unsupported rows fingerprintable
                    if let Ok(row) = read_csv_row(record.payload.as_bytes()) {
                        tx.deduplication_key = join_cells(row.iter());
                    }
                    tx
                })
            })
            .collect();

        debug!("Parsed {} mono transactions", transactions.len());
        Ok(transactions)
    }
}
