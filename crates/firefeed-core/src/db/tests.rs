//! Database tests

use super::*;
use crate::models::*;
use crate::store::{FingerprintStore, MessageStore};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

fn text_record(chat_id: i64, message_id: i64, minutes: i64) -> Record {
    Record {
        key: RecordKey::new(chat_id, message_id, 0),
        payload: RecordPayload::Text(format!("message {}", message_id)),
        source: TransactionSource::Privatbank,
        date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minutes),
        forwarded_from: None,
        is_processed: false,
    }
}

#[test]
fn test_migrations_are_recorded_once() {
    let db = Database::in_memory().unwrap();
    let applied = db.applied_migrations().unwrap();
    assert_eq!(applied.len(), MIGRATIONS.len());

    db.run_migrations().unwrap();
    assert_eq!(db.applied_migrations().unwrap(), applied);
}

#[test]
fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("firefeed.db");
    let path = path.to_string_lossy();

    Database::new(&path, None)
        .unwrap()
        .add_message(&text_record(1, 1, 0))
        .unwrap();

    let db = Database::new(&path, None).unwrap();
    assert_eq!(db.latest_messages(1).unwrap().len(), 1);
}

#[test]
fn test_encrypted_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret.db");
    let path = path.to_string_lossy();

    let db = Database::new(&path, Some("correct horse")).unwrap();
    db.add_message(&text_record(1, 1, 0)).unwrap();
    drop(db);

    let db = Database::new(&path, Some("correct horse")).unwrap();
    assert_eq!(db.latest_messages(1).unwrap().len(), 1);
    assert!(Database::new(&path, Some("wrong")).is_err());
}

#[test]
fn test_latest_messages_newest_first_and_unprocessed() {
    let db = Database::in_memory().unwrap();
    db.add_message(&text_record(1, 1, 0)).unwrap();
    db.add_message(&text_record(1, 2, 10)).unwrap();
    db.add_message(&text_record(1, 3, 5)).unwrap();
    db.add_message(&text_record(2, 4, 0)).unwrap();

    let ids: Vec<i64> = db
        .latest_messages(1)
        .unwrap()
        .iter()
        .map(|r| r.key.message_id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);

    db.mark_processed(&[RecordKey::new(1, 2, 0)]).unwrap();
    let ids: Vec<i64> = db
        .latest_messages(1)
        .unwrap()
        .iter()
        .map(|r| r.key.message_id)
        .collect();
    assert_eq!(ids, vec![3, 1]);

    db.clear(1).unwrap();
    assert!(db.latest_messages(1).unwrap().is_empty());
    assert_eq!(db.latest_messages(2).unwrap().len(), 1);
}

#[test]
fn test_binary_payload_round_trip() {
    let db = Database::in_memory().unwrap();
    let mut record = text_record(1, 1, 0);
    record.payload = RecordPayload::Binary(vec![0xef, 0xbb, 0xbf, b'1', b',', 0x00]);
    record.forwarded_from = Some("monobank".into());
    db.add_message(&record).unwrap();

    let stored = db.latest_messages(1).unwrap().remove(0);
    assert_eq!(stored, record);
}

#[test]
fn test_pending_counts() {
    let db = Database::in_memory().unwrap();
    db.add_message(&text_record(1, 1, 0)).unwrap();
    db.add_message(&text_record(1, 2, 0)).unwrap();
    let mut mono = text_record(2, 3, 0);
    mono.source = TransactionSource::Mono;
    db.add_message(&mono).unwrap();

    let counts = db.pending_counts().unwrap();
    assert_eq!(
        counts,
        vec![(TransactionSource::Mono, 1), (TransactionSource::Privatbank, 2)]
    );
}

#[test]
fn test_fingerprints_scoped_by_source() {
    let db = Database::in_memory().unwrap();
    db.add_duplicate_key("abc", TransactionSource::Mono).unwrap();
    db.add_duplicate_key("abc", TransactionSource::Mono).unwrap();
    assert_eq!(db.fingerprint_count().unwrap(), 1);

    let hashes = vec!["abc".to_string(), "def".to_string()];
    assert_eq!(
        db.get_duplicates(&hashes, TransactionSource::Mono).unwrap(),
        vec!["abc".to_string()]
    );
    assert!(db
        .get_duplicates(&hashes, TransactionSource::Zen)
        .unwrap()
        .is_empty());
}

#[test]
fn test_balance_tables() {
    let db = Database::in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let row = BalanceRow {
        id: "7".into(),
        balance: Decimal::new(12345, 2),
        currency_id: "1".into(),
        updated_at: now,
    };

    db.upsert_balance(&row).unwrap();
    let mut changed = row.clone();
    changed.balance = Decimal::new(100, 0);
    db.upsert_balance(&changed).unwrap();
    assert_eq!(db.list_balances().unwrap(), vec![changed.clone()]);

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    db.upsert_daily_balance(&row, day).unwrap();
    db.upsert_daily_balance(&changed, day).unwrap();
    assert_eq!(db.daily_balances(day).unwrap(), vec![changed]);

    db.delete_balance("7").unwrap();
    assert!(db.list_balances().unwrap().is_empty());
    assert_eq!(db.daily_balances(day).unwrap().len(), 1);
}
