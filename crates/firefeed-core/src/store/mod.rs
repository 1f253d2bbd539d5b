//! Record and fingerprint persistence contracts
//!
//! Two bindings implement both traits: [`crate::db::Database`] (SQLite) and
//! [`DocumentStore`] (JSON files in a directory).

mod document;

pub use document::DocumentStore;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Record, RecordKey, TransactionSource};

/// Append-only store of raw chat messages
pub trait MessageStore: Send + Sync {
    /// Store a record; re-adding the same key replaces it
    fn add_message(&self, record: &Record) -> Result<()>;

    /// Unprocessed records of a chat, newest first
    fn latest_messages(&self, chat_id: i64) -> Result<Vec<Record>>;

    /// Flag records as processed
    fn mark_processed(&self, keys: &[RecordKey]) -> Result<()>;

    /// Drop every record of a chat
    fn clear(&self, chat_id: i64) -> Result<()>;
}

/// Set of persisted `(source, fingerprint)` pairs
pub trait FingerprintStore: Send + Sync {
    /// Subset of `hashes` already stored under `source`
    fn get_duplicates(&self, hashes: &[String], source: TransactionSource) -> Result<Vec<String>>;

    /// Store one fingerprint; re-adding is a no-op
    fn add_duplicate_key(&self, hash: &str, source: TransactionSource) -> Result<()>;
}

/// Open the record and fingerprint stores selected by configuration
///
/// `FIREFEED_DOCUMENT_DIR` selects the document store, otherwise SQLite.
pub fn open_stores(config: &Config) -> Result<(Arc<dyn MessageStore>, Arc<dyn FingerprintStore>)> {
    if let Some(dir) = &config.document_dir {
        info!(dir = %dir.display(), "Using document record store");
        let store = Arc::new(DocumentStore::new(dir.clone())?);
        return Ok((store.clone(), store));
    }

    let db = Arc::new(Database::from_config(config)?);
    Ok((db.clone(), db))
}
