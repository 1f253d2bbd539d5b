//! Domain models for firefeed

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, RecordError, Result};

/// Supported message sources, one parser each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    Privatbank,
    Mono,
    Paribas,
    Revolut,
    Zen,
}

impl TransactionSource {
    pub const ALL: [TransactionSource; 5] = [
        Self::Privatbank,
        Self::Mono,
        Self::Paribas,
        Self::Revolut,
        Self::Zen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Privatbank => "privatbank",
            Self::Mono => "mono",
            Self::Paribas => "paribas",
            Self::Revolut => "revolut",
            Self::Zen => "zen",
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "privatbank" | "privat" => Ok(Self::Privatbank),
            "mono" | "monobank" => Ok(Self::Mono),
            "paribas" => Ok(Self::Paribas),
            "revolut" => Ok(Self::Revolut),
            "zen" => Ok(Self::Zen),
            _ => Err(Error::Config(format!("unknown transaction source: {}", s))),
        }
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Unknown,
    Income,
    Expense,
    InternalTransfer,
    RemoteTransfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Income => "income",
            Self::Expense => "expense",
            Self::InternalTransfer => "internal_transfer",
            Self::RemoteTransfer => "remote_transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a stored record: chat, message and row within a split document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub chat_id: i64,
    pub message_id: i64,
    pub part: u32,
}

impl RecordKey {
    pub fn new(chat_id: i64, message_id: i64, part: u32) -> Self {
        Self {
            chat_id,
            message_id,
            part,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.chat_id, self.message_id, self.part)
    }
}

/// Opaque record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPayload {
    /// Chat message text
    Text(String),
    /// Document bytes or one split row, kept verbatim
    Binary(Vec<u8>),
}

impl RecordPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn encoding(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "hex",
        }
    }

    /// Storage form: text as-is, binary hex-encoded
    pub fn encode(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Binary(b) => hex::encode(b),
        }
    }

    pub fn decode(encoding: &str, data: &str) -> Result<Self> {
        match encoding {
            "text" => Ok(Self::Text(data.to_string())),
            "hex" => hex::decode(data)
                .map(Self::Binary)
                .map_err(|e| Error::InvalidData(format!("bad hex payload: {}", e))),
            other => Err(Error::InvalidData(format!(
                "unknown payload encoding: {}",
                other
            ))),
        }
    }
}

/// A raw message as stored by ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub payload: RecordPayload,
    pub source: TransactionSource,
    /// Original timestamp (forward origin date when forwarded)
    pub date: DateTime<Utc>,
    pub forwarded_from: Option<String>,
    pub is_processed: bool,
}

/// Canonical normalized transaction, shared by every pipeline stage
///
/// Legs are sparse: an expense only has the source side, an income only the
/// destination side. Amounts are always positive magnitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Unique within one batch only
    pub id: String,
    pub kind: TransactionType,
    pub source_amount: Decimal,
    pub source_currency: String,
    pub source_account: String,
    pub destination_amount: Decimal,
    pub destination_currency: String,
    pub destination_account: String,
    pub date: DateTime<Utc>,
    /// "HH:MM" from the message body, used when full timestamps disagree
    pub date_from_message: String,
    pub description: String,
    /// Provenance blob forwarded to the ledger notes
    pub raw: String,
    pub transaction_source: TransactionSource,
    pub original_tx_type: String,
    pub original_counterpart_name: String,
    /// True when this leg is the TO side of a paired internal transfer
    pub internal_transfer_direction_to: bool,
    pub deduplication_key: String,
    /// Partner legs folded in by the merger
    pub duplicate_transactions: Vec<Transaction>,
    pub parsing_error: Option<RecordError>,
    pub origin: Option<RecordKey>,
}

impl Transaction {
    pub fn new(source: TransactionSource, date: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: TransactionType::Unknown,
            source_amount: Decimal::ZERO,
            source_currency: String::new(),
            source_account: String::new(),
            destination_amount: Decimal::ZERO,
            destination_currency: String::new(),
            destination_account: String::new(),
            date,
            date_from_message: String::new(),
            description: String::new(),
            raw: String::new(),
            transaction_source: source,
            original_tx_type: String::new(),
            original_counterpart_name: String::new(),
            internal_transfer_direction_to: false,
            deduplication_key: String::new(),
            duplicate_transactions: Vec::new(),
            parsing_error: None,
            origin: None,
        }
    }

    /// Start a transaction for a record, inheriting its date and key
    pub fn from_record(record: &Record) -> Self {
        let mut tx = Self::new(record.source, record.date);
        tx.origin = Some(record.key);
        tx.raw = String::from_utf8_lossy(record.payload.as_bytes()).into_owned();
        tx
    }

    /// Placeholder carrying a per-record failure
    pub fn failed(record: &Record, err: RecordError) -> Self {
        let mut tx = Self::from_record(record);
        tx.parsing_error = Some(err);
        tx
    }

    pub fn has_source_leg(&self) -> bool {
        !self.source_currency.is_empty() && self.source_amount > Decimal::ZERO
    }

    pub fn has_destination_leg(&self) -> bool {
        !self.destination_currency.is_empty() && self.destination_amount > Decimal::ZERO
    }

    /// Keys of this transaction and every companion leg
    pub fn deduplication_keys(&self) -> Vec<&str> {
        std::iter::once(self.deduplication_key.as_str())
            .chain(
                self.duplicate_transactions
                    .iter()
                    .map(|t| t.deduplication_key.as_str()),
            )
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// Record keys of this transaction and every companion leg
    pub fn origins(&self) -> Vec<RecordKey> {
        self.origin
            .into_iter()
            .chain(self.duplicate_transactions.iter().filter_map(|t| t.origin))
            .collect()
    }
}

/// An account from the ledger's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Comma-separated list of IBANs / masked card numbers
    pub account_number: String,
    #[serde(default)]
    pub current_balance: Option<Decimal>,
    #[serde(default)]
    pub currency_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trip() {
        for source in TransactionSource::ALL {
            let parsed: TransactionSource = source.as_str().parse().unwrap();
            assert_eq!(parsed, source);
        }
        assert!("bofa".parse::<TransactionSource>().is_err());
    }

    #[test]
    fn test_payload_encoding() {
        let payload = RecordPayload::Binary(vec![0xef, 0xbb, 0xbf, b'a']);
        let stored = payload.encode();
        assert_eq!(stored, "efbbbf61");
        assert_eq!(RecordPayload::decode("hex", &stored).unwrap(), payload);
        assert!(RecordPayload::decode("base64", "x").is_err());
    }

    #[test]
    fn test_legs() {
        let mut tx = Transaction::new(TransactionSource::Mono, Utc::now());
        assert!(!tx.has_source_leg());
        tx.source_amount = Decimal::new(100, 2);
        tx.source_currency = "UAH".into();
        assert!(tx.has_source_leg());
        assert!(!tx.has_destination_leg());
    }
}
