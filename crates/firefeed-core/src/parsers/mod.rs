//! Per-source message parsers
//!
//! Every bank feed is handled by one [`Parser`]. Tabular uploads (mono, zen,
//! paribas) are first cut into per-row payloads with [`Parser::split`]; the
//! rows are stored as independent records and later parsed in a batch with
//! [`Parser::parse`]. Per-record failures are attached to the resulting
//! transaction as `parsing_error`; only malformed batches return `Err`.

use std::str::FromStr;

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use rust_decimal::Decimal;

use crate::error::{Error, RecordError, Result};
use crate::models::{Record, Transaction, TransactionSource};

mod mono;
mod paribas;
mod privatbank;
mod revolut;
mod zen;

pub use mono::MonoParser;
pub use paribas::ParibasParser;
pub use privatbank::PrivatbankParser;
pub use revolut::RevolutParser;
pub use zen::ZenParser;

pub trait Parser: Send + Sync {
    /// Source tag this parser handles
    fn source(&self) -> TransactionSource;

    /// Whether uploads for this source are multi-row documents
    fn supports_split(&self) -> bool {
        false
    }

    /// Cut a document into one payload per row, preserving row bytes
    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(vec![data.to_vec()])
    }

    /// Parse a batch of single-row records
    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>>;

    /// Synthetic account name for sources without real account numbers
    fn account_name(&self, currency: &str) -> String {
        format!("{}_{}", self.source(), currency)
    }
}

/// Parser for a declared source tag
pub fn parser_for(source: TransactionSource) -> Box<dyn Parser> {
    match source {
        TransactionSource::Privatbank => Box::new(PrivatbankParser::new()),
        TransactionSource::Mono => Box::new(MonoParser),
        TransactionSource::Paribas => Box::new(ParibasParser),
        TransactionSource::Revolut => Box::new(RevolutParser::new()),
        TransactionSource::Zen => Box::new(ZenParser),
    }
}

/// Parse a money amount into a decimal, keeping its sign
///
/// Accepts `1234.56`, `1 234,56`, `1,234.56`, `1.234,56` and non-breaking spaces.
pub(crate) fn parse_amount(s: &str) -> std::result::Result<Decimal, RecordError> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    // The last separator is the decimal point, the other one groups thousands
    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), _) => cleaned.replace(',', ""),
        (None, _) => cleaned.replace(',', "."),
    };

    Decimal::from_str(&normalized)
        .map(|d| d.normalize())
        .map_err(|_| RecordError::parse(format!("unable to parse amount: {}", s)))
}

/// Split CSV bytes into rows, skipping the header
///
/// Row boundaries come from the reader's byte positions so each returned row
/// is the exact byte slice from the upload, minus the line terminator. Rows
/// are taken until the first empty first-column cell.
pub(crate) fn split_csv_rows(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut record = ByteRecord::new();
    let mut rows = Vec::new();
    let mut header_seen = false;

    loop {
        let start = reader.position().byte() as usize;
        if !reader.read_byte_record(&mut record)? {
            break;
        }
        let end = (reader.position().byte() as usize).min(data.len());

        if !header_seen {
            header_seen = true;
            continue;
        }

        let first_empty = record
            .get(0)
            .map_or(true, |cell| cell.iter().all(|b| b.is_ascii_whitespace()));
        if first_empty {
            break;
        }

        rows.push(trim_line_terminators(&data[start..end]).to_vec());
    }

    if rows.is_empty() {
        return Err(Error::Import("empty file".into()));
    }

    Ok(rows)
}

fn trim_line_terminators(mut bytes: &[u8]) -> &[u8] {
    while let [b'\r' | b'\n', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b'\r' | b'\n'] = bytes {
        bytes = rest;
    }
    bytes
}

/// Read the single CSV row stored in a record payload
pub(crate) fn read_csv_row(bytes: &[u8]) -> std::result::Result<StringRecord, RecordError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Ok(record),
        Ok(false) => Err(RecordError::parse("empty row")),
        Err(e) => Err(RecordError::parse(format!("invalid csv row: {}", e))),
    }
}

/// Required cell by index
pub(crate) fn cell<'a>(row: &'a StringRecord, idx: usize) -> std::result::Result<&'a str, RecordError> {
    row.get(idx)
        .map(str::trim)
        .ok_or_else(|| RecordError::parse(format!("missing column {}", idx)))
}

/// Underscore-joined row cells, the fingerprint source for tabular rows
pub(crate) fn join_cells<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    cells.into_iter().collect::<Vec<_>>().join("_")
}
