//! Import pipeline: records -> parse -> merge -> resolve -> dedup -> commit
//!
//! A run is strictly sequential: the merger needs the complete batch and
//! each commit is checked against persisted fingerprints. The only
//! suspension points are ledger calls; store access is synchronous.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::Message;
use crate::dedup::Deduplicator;
use crate::error::{Error, RecordError, Result};
use crate::ledger::Ledger;
use crate::merge::merge;
use crate::models::{Record, RecordKey, RecordPayload, Transaction, TransactionSource};
use crate::parsers::parser_for;
use crate::report::{EntryStatus, Outcome, Report, RunMode};
use crate::resolve::{map_transactions, AccountCatalog};
use crate::store::{FingerprintStore, MessageStore};

/// Chat commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Dry,
    Commit,
    Duplicates,
    Errors,
    Stat,
    Clear,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "dry",
            Self::Commit => "commit",
            Self::Duplicates => "duplicates",
            Self::Errors => "errors",
            Self::Stat => "stat",
            Self::Clear => "clear",
        }
    }

    /// Recognise a command in message text: `/dry`, `Commit`, `/stat@bot`
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim();
        let word = word.strip_prefix('/').unwrap_or(word);
        let word = word.split('@').next().unwrap_or(word);
        word.parse().ok()
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dry" => Ok(Self::Dry),
            "commit" => Ok(Self::Commit),
            "duplicates" => Ok(Self::Duplicates),
            "errors" => Ok(Self::Errors),
            "stat" => Ok(Self::Stat),
            "clear" => Ok(Self::Clear),
            _ => Err(Error::InvalidData(format!("unknown command: {}", s))),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Turn an incoming chat message into records for its chat's source
///
/// `document` holds the downloaded bytes when the message carries a file.
/// Documents of splittable sources become one record per row.
pub fn records_from_message(
    source: TransactionSource,
    message: &Message,
    document: Option<Vec<u8>>,
) -> Result<Vec<Record>> {
    let date = message.original_date();
    let forwarded_from = message.forwarded_from();
    let make = |part: u32, payload: RecordPayload| Record {
        key: RecordKey::new(message.chat.id, message.message_id, part),
        payload,
        source,
        date,
        forwarded_from: forwarded_from.clone(),
        is_processed: false,
    };

    if let Some(bytes) = document {
        let parser = parser_for(source);
        let rows = if parser.supports_split() {
            parser.split(&bytes)?
        } else {
            vec![bytes]
        };
        return Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| make(i as u32, RecordPayload::Binary(row)))
            .collect());
    }

    match &message.text {
        Some(text) if !text.trim().is_empty() => Ok(vec![make(0, RecordPayload::Text(text.clone()))]),
        _ => Ok(Vec::new()),
    }
}

/// Parse and merge a batch of records in chat order
pub fn parse_records(source: TransactionSource, mut records: Vec<Record>) -> Result<Vec<Transaction>> {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.key.cmp(&b.key)));

    let parser = parser_for(source);
    let parsed = parser.parse(&records)?;
    let merged = merge(parsed);

    debug!(
        source = %source,
        records = records.len(),
        transactions = merged.len(),
        "Parsed batch"
    );
    Ok(merged)
}

pub struct Pipeline {
    ledger: Arc<dyn Ledger>,
    messages: Arc<dyn MessageStore>,
    fingerprints: Arc<dyn FingerprintStore>,
}

impl Pipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        messages: Arc<dyn MessageStore>,
        fingerprints: Arc<dyn FingerprintStore>,
    ) -> Self {
        Self {
            ledger,
            messages,
            fingerprints,
        }
    }

    pub fn messages(&self) -> &Arc<dyn MessageStore> {
        &self.messages
    }

    /// Store the records of an incoming message
    pub fn ingest(&self, records: &[Record]) -> Result<usize> {
        for record in records {
            self.messages.add_message(record)?;
        }
        Ok(records.len())
    }

    /// Run the pipeline over a chat's pending records
    pub async fn run(&self, chat_id: i64, source: TransactionSource, mode: RunMode) -> Result<Report> {
        let records = self.messages.latest_messages(chat_id)?;
        let pending_records = records.len();
        let transactions = parse_records(source, records)?;

        let accounts = self.ledger.list_accounts().await?;
        let catalog = AccountCatalog::new(&accounts)?;

        let dedup = Deduplicator::new(self.fingerprints.as_ref());
        let duplicates = dedup.find_duplicates(source, &transactions)?;

        let mut outcomes = Vec::new();
        for mut mapped in map_transactions(transactions, &catalog) {
            if mapped.transaction.parsing_error.is_none()
                && duplicates.contains(&mapped.transaction.id)
            {
                mapped.request = None;
                mapped.error = Some(RecordError::Duplicate);
            }

            let status = if let Some(err) = &mapped.error {
                if mode == RunMode::Commit && err.is_sentinel() {
                    // Duplicates and unsupported rows will never import
                    self.messages.mark_processed(&mapped.transaction.origins())?;
                }
                EntryStatus::from_error(err)
            } else if mode == RunMode::Dry {
                EntryStatus::Ready
            } else if let Some(request) = &mapped.request {
                match self.ledger.create_transaction(request).await {
                    Ok(()) => {
                        dedup.remember(source, &mapped.transaction)?;
                        self.messages.mark_processed(&mapped.transaction.origins())?;
                        EntryStatus::Committed
                    }
                    Err(e) => {
                        warn!(id = %mapped.transaction.id, error = %e, "Ledger rejected transaction");
                        EntryStatus::from_error(&RecordError::Ledger(e.to_string()))
                    }
                }
            } else {
                EntryStatus::Error("no ledger payload".to_string())
            };
            if let EntryStatus::Error(msg) = &status {
                if mapped.error.is_none() {
                    mapped.error = Some(RecordError::Ledger(msg.clone()));
                }
            }

            outcomes.push(Outcome { mapped, status });
        }

        let report = Report {
            mode,
            source,
            pending_records,
            outcomes,
        };
        let counts = report.counts();
        info!(
            chat_id,
            source = %source,
            mode = mode.as_str(),
            ok = counts.ok,
            errors = counts.errors,
            unsupported = counts.unsupported,
            duplicates = counts.duplicates,
            "Pipeline run complete"
        );
        Ok(report)
    }

    /// Execute a chat command and return the reply text
    pub async fn execute(&self, chat_id: i64, source: TransactionSource, command: Command) -> Result<String> {
        debug!(chat_id, command = %command, "Executing command");
        match command {
            Command::Clear => {
                let pending = self.messages.latest_messages(chat_id)?.len();
                self.messages.clear(chat_id)?;
                Ok(format!("🗑 Cleared {} pending records\n", pending))
            }
            Command::Commit => Ok(self.run(chat_id, source, RunMode::Commit).await?.render()),
            Command::Dry => Ok(self.run(chat_id, source, RunMode::Dry).await?.render()),
            Command::Duplicates => Ok(self
                .run(chat_id, source, RunMode::Dry)
                .await?
                .render_duplicates()),
            Command::Errors => Ok(self.run(chat_id, source, RunMode::Dry).await?.render_errors()),
            Command::Stat => Ok(self.run(chat_id, source, RunMode::Dry).await?.render_stat()),
        }
    }
}
