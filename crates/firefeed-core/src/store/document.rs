//! JSON document store
//!
//! ```text
//! <dir>/
//!   messages.json
//!   fingerprints.json
//! ```
//!
//! Each collection is rewritten in full on every change (write to a temp file,
//! then rename). A mutex serializes access within the process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::{FingerprintStore, MessageStore};
use crate::error::{Error, Result};
use crate::models::{Record, RecordKey, RecordPayload, TransactionSource};

const MESSAGES_FILE: &str = "messages.json";
const FINGERPRINTS_FILE: &str = "fingerprints.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageDocument {
    chat_id: i64,
    message_id: i64,
    part: u32,
    source: TransactionSource,
    encoding: String,
    data: String,
    date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forwarded_from: Option<String>,
    #[serde(default)]
    is_processed: bool,
}

impl MessageDocument {
    fn from_record(record: &Record) -> Self {
        Self {
            chat_id: record.key.chat_id,
            message_id: record.key.message_id,
            part: record.key.part,
            source: record.source,
            encoding: record.payload.encoding().to_string(),
            data: record.payload.encode(),
            date: record.date,
            forwarded_from: record.forwarded_from.clone(),
            is_processed: record.is_processed,
        }
    }

    fn key(&self) -> RecordKey {
        RecordKey::new(self.chat_id, self.message_id, self.part)
    }

    fn into_record(self) -> Result<Record> {
        Ok(Record {
            key: self.key(),
            payload: RecordPayload::decode(&self.encoding, &self.data)?,
            source: self.source,
            date: self.date,
            forwarded_from: self.forwarded_from,
            is_processed: self.is_processed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FingerprintDocument {
    source: TransactionSource,
    hash: String,
}

#[derive(Debug)]
pub struct DocumentStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl DocumentStore {
    /// Open (and create) a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened document store");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| Error::InvalidData(format!("document store lock poisoned: {}", e)))
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        match fs::read_to_string(self.dir.join(name)) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        fs::write(&tmp, serde_json::to_string_pretty(items)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl MessageStore for DocumentStore {
    fn add_message(&self, record: &Record) -> Result<()> {
        let _guard = self.guard()?;
        let mut docs: Vec<MessageDocument> = self.read(MESSAGES_FILE)?;
        let doc = MessageDocument::from_record(record);
        match docs.iter_mut().find(|d| d.key() == record.key) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        self.write(MESSAGES_FILE, &docs)
    }

    fn latest_messages(&self, chat_id: i64) -> Result<Vec<Record>> {
        let _guard = self.guard()?;
        let mut docs: Vec<MessageDocument> = self
            .read::<MessageDocument>(MESSAGES_FILE)?
            .into_iter()
            .filter(|d| d.chat_id == chat_id && !d.is_processed)
            .collect();
        docs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.key().cmp(&a.key())));
        docs.into_iter().map(MessageDocument::into_record).collect()
    }

    fn mark_processed(&self, keys: &[RecordKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let _guard = self.guard()?;
        let mut docs: Vec<MessageDocument> = self.read(MESSAGES_FILE)?;
        for doc in docs.iter_mut().filter(|d| keys.contains(&d.key())) {
            doc.is_processed = true;
        }
        self.write(MESSAGES_FILE, &docs)
    }

    fn clear(&self, chat_id: i64) -> Result<()> {
        let _guard = self.guard()?;
        let docs: Vec<MessageDocument> = self
            .read::<MessageDocument>(MESSAGES_FILE)?
            .into_iter()
            .filter(|d| d.chat_id != chat_id)
            .collect();
        self.write(MESSAGES_FILE, &docs)
    }
}

impl FingerprintStore for DocumentStore {
    fn get_duplicates(&self, hashes: &[String], source: TransactionSource) -> Result<Vec<String>> {
        let _guard = self.guard()?;
        let stored: Vec<FingerprintDocument> = self.read(FINGERPRINTS_FILE)?;
        Ok(hashes
            .iter()
            .filter(|h| stored.iter().any(|f| f.source == source && &f.hash == *h))
            .cloned()
            .collect())
    }

    fn add_duplicate_key(&self, hash: &str, source: TransactionSource) -> Result<()> {
        let _guard = self.guard()?;
        let mut stored: Vec<FingerprintDocument> = self.read(FINGERPRINTS_FILE)?;
        let doc = FingerprintDocument {
            source,
            hash: hash.to_string(),
        };
        if stored.contains(&doc) {
            return Ok(());
        }
        stored.push(doc);
        self.write(FINGERPRINTS_FILE, &stored)
    }
}
