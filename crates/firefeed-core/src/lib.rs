//! Firefeed Core Library
//!
//! Turns bank notifications and statement exports posted to a chat into
//! ledger transactions:
//! - Per-bank parsers (PrivatBank SMS, Monobank/Zen CSV, Revolut JSON, Paribas XLSX)
//! - Merging of paired internal-transfer legs
//! - Account resolution against the ledger catalog
//! - Fingerprint-based deduplication across runs
//! - Record and fingerprint stores (SQLite or JSON documents)
//! - Ledger and chat HTTP clients
//! - Account balance snapshots

pub mod chat;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod ledger;
pub mod merge;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod snapshot;
pub mod store;

/// Test utilities including mock ledger, chat and Firefly server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chat::{ChatApi, TelegramClient};
pub use config::{ChatSources, Config};
pub use db::Database;
pub use error::{Error, RecordError, Result};
pub use ledger::{FireflyClient, Ledger, TransactionRequest};
pub use models::{Account, Record, RecordKey, RecordPayload, Transaction, TransactionSource, TransactionType};
pub use pipeline::{Command, Pipeline};
pub use report::{Report, RunMode};
pub use snapshot::{run_snapshot, SnapshotSummary};
pub use store::{DocumentStore, FingerprintStore, MessageStore};
