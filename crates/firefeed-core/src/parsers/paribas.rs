//! BNP Paribas (PL) XLSX account history
//!
//! Split turns every worksheet row into a JSON array of cell strings, which is
//! the stored record payload. Two layouts exist:
//!
//! - V1 (11 columns): booking date, execution date, amount, currency,
//!   counterpart, description, account, type, transaction amount,
//!   transaction currency, status
//! - V2 (12 columns): as V1 but the counterpart is split into sender and
//!   receiver columns

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, DataType, Reader, Xlsx};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use super::{join_cells, parse_amount, Parser};
use crate::error::{Error, RecordError, Result};
use crate::models::{Record, Transaction, TransactionSource, TransactionType};

const V2_MIN_COLUMNS: usize = 12;
const V1_MIN_COLUMNS: usize = 10;

struct Columns {
    execution_date: usize,
    amount: usize,
    currency: usize,
    sender: usize,
    receiver: usize,
    description: usize,
    account: usize,
    kind: usize,
    tx_amount: usize,
    tx_currency: usize,
}

const V1: Columns = Columns {
    execution_date: 1,
    amount: 2,
    currency: 3,
    sender: 4,
    receiver: 4,
    description: 5,
    account: 6,
    kind: 7,
    tx_amount: 8,
    tx_currency: 9,
};

const V2: Columns = Columns {
    execution_date: 1,
    amount: 2,
    currency: 3,
    sender: 4,
    receiver: 5,
    description: 6,
    account: 7,
    kind: 8,
    tx_amount: 9,
    tx_currency: 10,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Leg {
    Expense,
    Income,
    Outgoing,
}

fn classify(label: &str) -> Option<Leg> {
    match label.trim().to_lowercase().as_str() {
        "transakcja kartą" | "transakcja blik" | "prowizje i opłaty" => Some(Leg::Expense),
        "przelew zagraniczny" | "przelew przychodzący" => Some(Leg::Income),
        "przelew wychodzący" => Some(Leg::Outgoing),
        _ => None,
    }
}

/// Last non-empty line, lowercased, without the country prefix
fn normalize_account(cell: &str) -> String {
    cell.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or_default()
        .to_lowercase()
        .trim_start_matches(char::is_alphabetic)
        .trim()
        .to_string()
}

fn first_line(cell: &str) -> String {
    cell.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn parse_date(s: &str) -> std::result::Result<DateTime<Utc>, RecordError> {
    let s = s.trim();
    ["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| RecordError::parse(format!("unable to parse date: {}", s)))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

pub struct ParibasParser;

impl ParibasParser {
    fn parse_record(&self, record: &Record) -> Result<Transaction> {
        let cells: Vec<String> = match serde_json::from_slice(record.payload.as_bytes()) {
            Ok(cells) => cells,
            Err(e) => {
                return Ok(Transaction::failed(
                    record,
                    RecordError::parse(format!("invalid paribas row: {}", e)),
                ))
            }
        };

        if cells.len() < V1_MIN_COLUMNS {
            return Ok(Transaction::failed(
                record,
                RecordError::parse(format!("expected at least {} columns, got {}", V1_MIN_COLUMNS, cells.len())),
            ));
        }
        let cols = if cells.len() >= V2_MIN_COLUMNS { &V2 } else { &V1 };

        let currency = cells[cols.currency].trim().to_uppercase();
        let tx_currency = cells[cols.tx_currency].trim().to_uppercase();
        if currency != tx_currency {
            return Err(Error::Import(format!(
                "record {}: transaction currency {} does not match account currency {}",
                record.key, tx_currency, currency
            )));
        }

        let amount = match parse_amount(&cells[cols.amount]) {
            Ok(a) => a,
            Err(err) => return Ok(Transaction::failed(record, err)),
        };
        let tx_amount = match parse_amount(&cells[cols.tx_amount]) {
            Ok(a) => a,
            Err(err) => return Ok(Transaction::failed(record, err)),
        };
        if amount.abs() != tx_amount.abs() {
            return Ok(Transaction::failed(
                record,
                RecordError::parse(format!(
                    "transaction amount {} does not match amount {}",
                    tx_amount, amount
                )),
            ));
        }

        let mut tx = Transaction::from_record(record);
        tx.deduplication_key = join_cells(cells.iter().map(String::as_str));

        let label = cells[cols.kind].trim().to_string();
        let Some(leg) = classify(&label) else {
            tx.parsing_error = Some(RecordError::parse(format!(
                "unsupported paribas transaction type: {}",
                label
            )));
            return Ok(tx);
        };

        match parse_date(&cells[cols.execution_date]) {
            Ok(date) => tx.date = date,
            Err(err) => {
                tx.parsing_error = Some(err);
                return Ok(tx);
            }
        }

        tx.description = cells[cols.description].trim().to_string();
        tx.original_tx_type = label;
        let own_account = normalize_account(&cells[cols.account]);
        let amount = amount.abs();

        match leg {
            Leg::Expense | Leg::Outgoing => {
                let counterpart = &cells[cols.receiver];
                tx.kind = if leg == Leg::Expense {
                    TransactionType::Expense
                } else {
                    TransactionType::RemoteTransfer
                };
                tx.source_amount = amount;
                tx.source_currency = currency;
                tx.source_account = own_account;
                tx.original_counterpart_name = first_line(counterpart);
                if leg == Leg::Outgoing {
                    tx.destination_account = normalize_account(counterpart);
                }
            }
            Leg::Income => {
                let counterpart = &cells[cols.sender];
                tx.kind = TransactionType::Income;
                tx.destination_amount = amount;
                tx.destination_currency = currency;
                tx.destination_account = own_account;
                tx.original_counterpart_name = first_line(counterpart);
            }
        }

        Ok(tx)
    }
}

impl Parser for ParibasParser {
    fn source(&self) -> TransactionSource {
        TransactionSource::Paribas
    }

    fn supports_split(&self) -> bool {
        true
    }

    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        if data.is_empty() {
            return Err(Error::Import("empty file".into()));
        }

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Import("empty file".into()))??;

        let mut rows = Vec::new();
        for row in range.rows().skip(1) {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.first().map_or(true, |c| c.trim().is_empty()) {
                break;
            }
            rows.push(serde_json::to_vec(&cells)?);
        }

        if rows.is_empty() {
            return Err(Error::Import("empty file".into()));
        }

        debug!("Split paribas workbook into {} rows", rows.len());
        Ok(rows)
    }

    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>> {
        let transactions = records
            .iter()
            .map(|record| self.parse_record(record))
            .collect::<Result<Vec<_>>>()?;

        debug!("Parsed {} paribas transactions", transactions.len());
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordKey, RecordPayload};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn record(id: i64, cells: &[&str]) -> Record {
        Record {
            key: RecordKey::new(4, 1, id as u32),
            payload: RecordPayload::Binary(serde_json::to_vec(&cells).unwrap()),
            source: TransactionSource::Paribas,
            date: Utc::now(),
            forwarded_from: None,
            is_processed: false,
        }
    }

    #[test]
    fn test_v1_card_expense() {
        let rec = record(
            0,
            &[
                "2023-05-10", "2023-05-09", "-45.99", "PLN", "ZABKA Z1234", "ZABKA Z1234 WARSZAWA",
                "PL61 1090 1014 0000 0712 1981 2874", "Transakcja kartą", "-45.99", "PLN", "Zaksięgowana",
            ],
        );
        let txs = ParibasParser.parse(&[rec]).unwrap();
        let tx = &txs[0];
        assert!(tx.parsing_error.is_none());
        assert_eq!(tx.kind, TransactionType::Expense);
        assert_eq!(tx.source_amount, Decimal::new(4599, 2));
        assert_eq!(tx.source_currency, "PLN");
        assert_eq!(tx.source_account, "61 1090 1014 0000 0712 1981 2874");
        assert_eq!(tx.date, Utc.with_ymd_and_hms(2023, 5, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_v2_outgoing_and_incoming() {
        let out = record(
            0,
            &[
                "2023-05-10", "2023-05-10", "-1200", "PLN", "Jan Kowalski", "Jan Kowalski\nPL27 1140 2004 0000 3002 0135 5387",
                "Oszczędności", "PL61 1090 1014 0000 0712 1981 2874", "Przelew wychodzący", "-1200", "PLN", "Zaksięgowana",
            ],
        );
        let inn = record(
            1,
            &[
                "2023-05-10", "2023-05-10", "1200", "PLN", "Jan Kowalski", "Jan Kowalski",
                "Oszczędności", "PL27 1140 2004 0000 3002 0135 5387", "Przelew przychodzący", "1200", "PLN", "Zaksięgowana",
            ],
        );
        let txs = ParibasParser.parse(&[out, inn]).unwrap();

        assert_eq!(txs[0].kind, TransactionType::RemoteTransfer);
        assert_eq!(txs[0].destination_account, "27 1140 2004 0000 3002 0135 5387");
        assert_eq!(txs[1].kind, TransactionType::Income);
        assert_eq!(txs[1].destination_amount, Decimal::new(1200, 0));
        assert_eq!(txs[1].destination_account, "27 1140 2004 0000 3002 0135 5387");
        assert_eq!(txs[1].original_counterpart_name, "Jan Kowalski");
    }

    #[test]
    fn test_currency_mismatch_is_fatal() {
        let rec = record(
            0,
            &[
                "2023-05-10", "2023-05-09", "-45.99", "PLN", "Shop", "Shop",
                "PL61 1090", "Transakcja kartą", "-10.00", "EUR", "Zaksięgowana",
            ],
        );
        assert!(matches!(ParibasParser.parse(&[rec]), Err(Error::Import(_))));
    }

    #[test]
    fn test_amount_mismatch_fails_row() {
        let bad = record(
            0,
            &[
                "2023-05-10", "2023-05-09", "-45.99", "PLN", "Shop", "Shop",
                "PL61 1090", "Transakcja kartą", "-40.00", "PLN", "Zaksięgowana",
            ],
        );
        let good = record(
            1,
            &[
                "2023-05-10", "2023-05-09", "-12.00", "PLN", "Kiosk", "Kiosk",
                "PL61 1090", "Transakcja BLIK", "-12.00", "PLN", "Zaksięgowana",
            ],
        );
        let txs = ParibasParser.parse(&[bad, good]).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs[0]
            .parsing_error
            .as_ref()
            .is_some_and(|e| e.to_string().contains("does not match amount")));
        assert!(txs[1].parsing_error.is_none());
        assert_eq!(txs[1].source_amount, Decimal::new(12, 0));
    }

    #[test]
    fn test_unknown_label_fails_row() {
        let rec = record(
            0,
            &[
                "2023-05-10", "2023-05-09", "10", "PLN", "Bank", "Odsetki",
                "PL61 1090", "Kapitalizacja odsetek", "10", "PLN", "Zaksięgowana",
            ],
        );
        let txs = ParibasParser.parse(&[rec]).unwrap();
        assert!(txs[0].parsing_error.is_some());
        assert!(!txs[0].deduplication_key.is_empty());
    }

    #[test]
    fn test_normalize_account() {
        assert_eq!(normalize_account("Main\n\nPL61 1090  \n"), "61 1090");
        assert_eq!(normalize_account("61109"), "61109");
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(ParibasParser.split(b"").is_err());
        assert!(ParibasParser.split(b"not a zip archive").is_err());
    }
}
