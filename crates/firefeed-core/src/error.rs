//! Error types for firefeed
//!
//! Two families live here:
//! - [`Error`]: batch-fatal failures (configuration, storage, transport)
//! - [`RecordError`]: per-record outcomes carried on a transaction without
//!   aborting the batch, including the `Duplicate` and
//!   `OperationNotSupported` sentinels the reporter buckets separately

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX parsing error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome attached to a single transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Fingerprint already persisted for this source
    #[error("duplicate transaction")]
    Duplicate,

    /// The source produced an operation the pipeline does not import
    #[error("{0}")]
    OperationNotSupported(String),

    #[error("{0}")]
    Parse(String),

    #[error("account with IBAN {0} not found")]
    AccountNotFound(String),

    #[error("{0}")]
    Ledger(String),
}

impl RecordError {
    /// Sentinels are reported in their own buckets instead of as errors
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Duplicate | Self::OperationNotSupported(_))
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<Error> for RecordError {
    fn from(err: Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_not_found_message() {
        let err = RecordError::AccountNotFound("4*68".into());
        assert_eq!(err.to_string(), "account with IBAN 4*68 not found");
    }

    #[test]
    fn test_sentinels() {
        assert!(RecordError::Duplicate.is_sentinel());
        assert!(RecordError::OperationNotSupported("x".into()).is_sentinel());
        assert!(!RecordError::parse("bad").is_sentinel());
    }
}
