//! Integration tests for firefeed-core
//!
//! These tests exercise the full ingest → parse → merge → resolve → commit
//! workflow against both record store bindings.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use firefeed_core::{
    chat::{Chat, Message},
    dedup::fingerprint,
    ledger::{Ledger, LedgerTransactionType, TransactionRequest},
    pipeline::{records_from_message, Command, Pipeline},
    report::{EntryStatus, RunMode},
    Account, Database, DocumentStore, FingerprintStore, MessageStore, Result,
    TransactionSource,
};

/// Ledger double that keeps every created request
struct RecordingLedger {
    accounts: Vec<Account>,
    created: Mutex<Vec<TransactionRequest>>,
}

impl RecordingLedger {
    fn new() -> Self {
        let account = |id: &str, name: &str, number: &str| Account {
            id: id.into(),
            name: name.into(),
            account_number: number.into(),
            current_balance: None,
            currency_id: None,
        };
        Self {
            accounts: vec![
                account("1", "Privat UAH", "4*68"),
                account("2", "Privat Universal", "5*20, UA213223130000026007233566001"),
                account("3", "Privat USD", "4*71"),
                account("4", "Mono", "mono_UAH"),
            ],
            created: Mutex::new(Vec::new()),
        }
    }

    fn created(&self) -> Vec<TransactionRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    async fn create_transaction(&self, request: &TransactionRequest) -> Result<()> {
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn text_message(chat_id: i64, message_id: i64, minute: u32, text: &str) -> Message {
    Message {
        message_id,
        date: Utc
            .with_ymd_and_hms(2023, 6, 5, 16, minute, 0)
            .unwrap()
            .timestamp(),
        chat: Chat { id: chat_id },
        text: Some(text.to_string()),
        forward_origin: None,
        document: None,
    }
}

const TRANSFER_OUT: &str =
    "1.00UAH Переказ на свою карту 51**20 через додаток Приват24\n4*68 16:13\nБал. 18.81UAH";
const TRANSFER_IN: &str =
    "1.00UAH Переказ зі своєї карти 47**68 через додаток Приват24\n5*20 16:13\nБал. 123.32UAH";
const STEAM: &str = "1.33USD Розваги. Steam\n4*71 16:27\nБал. 1.55USD";

fn ingest_privat(pipeline: &Pipeline, chat_id: i64) {
    for (id, minute, text) in [(1, 13, TRANSFER_OUT), (2, 14, TRANSFER_IN), (3, 27, STEAM)] {
        let records = records_from_message(
            TransactionSource::Privatbank,
            &text_message(chat_id, id, minute, text),
            None,
        )
        .unwrap();
        pipeline.ingest(&records).unwrap();
    }
}

// =============================================================================
// PrivatBank end-to-end
// =============================================================================

#[tokio::test]
async fn test_privatbank_commit_workflow() {
    let db = Arc::new(Database::in_memory().expect("Failed to create database"));
    let ledger = Arc::new(RecordingLedger::new());
    let pipeline = Pipeline::new(ledger.clone(), db.clone(), db.clone());

    ingest_privat(&pipeline, -100);

    let dry = pipeline
        .run(-100, TransactionSource::Privatbank, RunMode::Dry)
        .await
        .unwrap();
    assert_eq!(dry.outcomes.len(), 2, "transfer legs should merge");
    assert!(ledger.created().is_empty());

    let report = pipeline
        .run(-100, TransactionSource::Privatbank, RunMode::Commit)
        .await
        .unwrap();
    assert_eq!(report.counts().ok, 2);

    let created = ledger.created();
    assert_eq!(created.len(), 2);

    let transfer = &created[0].transactions[0];
    assert_eq!(transfer.kind, LedgerTransactionType::Transfer);
    assert_eq!(transfer.source_id.as_deref(), Some("1"));
    assert_eq!(transfer.destination_id.as_deref(), Some("2"));
    assert_eq!(transfer.amount, "1.00");
    assert_eq!(transfer.currency_code, "UAH");

    let steam = &created[1].transactions[0];
    assert_eq!(steam.kind, LedgerTransactionType::Withdrawal);
    assert_eq!(steam.source_id.as_deref(), Some("3"));
    assert_eq!(steam.amount, "1.33");
    assert_eq!(steam.description, "Розваги. Steam");
    assert!(steam.external_id.is_some());

    // Both transfer legs and the expense: three fingerprints, nothing pending
    assert_eq!(db.fingerprint_count().unwrap(), 3);
    assert!(db.latest_messages(-100).unwrap().is_empty());
}

#[tokio::test]
async fn test_posting_same_batch_twice_is_idempotent() {
    let db = Arc::new(Database::in_memory().unwrap());
    let ledger = Arc::new(RecordingLedger::new());
    let pipeline = Pipeline::new(ledger.clone(), db.clone(), db.clone());

    ingest_privat(&pipeline, -100);
    pipeline
        .run(-100, TransactionSource::Privatbank, RunMode::Commit)
        .await
        .unwrap();
    let after_first = ledger.created().len();

    ingest_privat(&pipeline, -100);
    let second = pipeline
        .run(-100, TransactionSource::Privatbank, RunMode::Commit)
        .await
        .unwrap();

    assert_eq!(ledger.created().len(), after_first);
    assert_eq!(second.counts().duplicates, second.outcomes.len());
    assert!(second
        .outcomes
        .iter()
        .all(|o| o.status == EntryStatus::Duplicate));
}

#[tokio::test]
async fn test_fingerprints_are_scoped_by_source() {
    let db = Database::in_memory().unwrap();
    let hash = fingerprint("same key");
    db.add_duplicate_key(&hash, TransactionSource::Mono).unwrap();

    assert_eq!(
        db.get_duplicates(&[hash.clone()], TransactionSource::Mono)
            .unwrap(),
        vec![hash.clone()]
    );
    assert!(db
        .get_duplicates(&[hash], TransactionSource::Zen)
        .unwrap()
        .is_empty());
}

// =============================================================================
// Document uploads
// =============================================================================

const MONO_EXPORT: &str = "Дата i час операції,Деталі операції,MCC,Сума в валюті картки (UAH),Сума в валюті операції,Валюта\n\
05.06.2023 12:01:02,Сільпо,5411,-245.50,-245.50,UAH\n\
03.06.2023 18:00:00,Від: Іван,4829,500.00,500.00,UAH\n";

#[tokio::test]
async fn test_mono_document_with_document_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DocumentStore::new(dir.path()).unwrap());
    let ledger = Arc::new(RecordingLedger::new());
    let pipeline = Pipeline::new(ledger.clone(), store.clone(), store.clone());

    let mut upload = text_message(-200, 10, 0, "");
    upload.text = None;
    let records = records_from_message(
        TransactionSource::Mono,
        &upload,
        Some(MONO_EXPORT.as_bytes().to_vec()),
    )
    .unwrap();
    assert_eq!(records.len(), 2);
    pipeline.ingest(&records).unwrap();

    let reply = pipeline
        .execute(-200, TransactionSource::Mono, Command::Commit)
        .await
        .unwrap();
    assert!(reply.contains("ok: 1"));
    assert!(reply.contains("unsupported: 1"));
    assert!(reply.contains("income operations are not supported"));

    let created = ledger.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].transactions[0].amount, "245.50");
    assert_eq!(created[0].transactions[0].source_id.as_deref(), Some("4"));

    // Unsupported rows are settled along with committed ones
    assert!(store.latest_messages(-200).unwrap().is_empty());
}

#[tokio::test]
async fn test_stat_and_clear_commands() {
    let db = Arc::new(Database::in_memory().unwrap());
    let pipeline = Pipeline::new(Arc::new(RecordingLedger::new()), db.clone(), db.clone());
    ingest_privat(&pipeline, -100);

    let stat = pipeline
        .execute(-100, TransactionSource::Privatbank, Command::Stat)
        .await
        .unwrap();
    assert!(stat.contains("pending records: 3 (privatbank)"));

    pipeline
        .execute(-100, TransactionSource::Privatbank, Command::Clear)
        .await
        .unwrap();
    let stat = pipeline
        .execute(-100, TransactionSource::Privatbank, Command::Stat)
        .await
        .unwrap();
    assert!(stat.contains("pending records: 0"));
}
