//! Human-readable run reports for the chat channel

use std::fmt::Write;

use crate::error::RecordError;
use crate::models::{Transaction, TransactionSource};
use crate::resolve::MappedTransaction;

/// Whether a run wrote to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dry,
    Commit,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "dry run",
            Self::Commit => "commit",
        }
    }
}

/// Per-transaction outcome
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus {
    /// Would be written (dry run)
    Ready,
    Committed,
    Duplicate,
    Unsupported(String),
    Error(String),
}

impl EntryStatus {
    pub fn from_error(err: &RecordError) -> Self {
        match err {
            RecordError::Duplicate => Self::Duplicate,
            RecordError::OperationNotSupported(msg) => Self::Unsupported(msg.clone()),
            other => Self::Error(other.to_string()),
        }
    }

    fn headline(&self) -> String {
        match self {
            Self::Ready => "🟢 Ready".to_string(),
            Self::Committed => "✅ Committed".to_string(),
            Self::Duplicate => "🔁 Duplicate".to_string(),
            Self::Unsupported(msg) => format!("⚠️ Unsupported: {}", msg),
            Self::Error(msg) => format!("❌ Has Error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub mapped: MappedTransaction,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub ok: usize,
    pub errors: usize,
    pub unsupported: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub mode: RunMode,
    pub source: TransactionSource,
    /// Unprocessed records the run started from
    pub pending_records: usize,
    pub outcomes: Vec<Outcome>,
}

fn render_legs(tx: &Transaction) -> String {
    let source = tx
        .has_source_leg()
        .then(|| format!("{} {}", tx.source_amount, tx.source_currency));
    let destination = tx
        .has_destination_leg()
        .then(|| format!("{} {}", tx.destination_amount, tx.destination_currency));
    match (source, destination) {
        (Some(s), Some(d)) if s == d => s,
        (Some(s), Some(d)) => format!("{} -> {}", s, d),
        (Some(s), None) => s,
        (None, Some(d)) => d,
        (None, None) => "-".to_string(),
    }
}

fn render_accounts(tx: &Transaction) -> String {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    format!(
        "{} -> {}",
        or_dash(&tx.source_account),
        or_dash(&tx.destination_account)
    )
}

impl Report {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                EntryStatus::Ready | EntryStatus::Committed => counts.ok += 1,
                EntryStatus::Duplicate => counts.duplicates += 1,
                EntryStatus::Unsupported(_) => counts.unsupported += 1,
                EntryStatus::Error(_) => counts.errors += 1,
            }
        }
        counts
    }

    pub fn header(&self) -> String {
        let counts = self.counts();
        format!(
            "📊 {} ({})\nok: {}\nerrors: {}\nunsupported: {}\nduplicates: {}\n",
            self.mode.as_str(),
            self.source,
            counts.ok,
            counts.errors,
            counts.unsupported,
            counts.duplicates
        )
    }

    fn render_outcome(outcome: &Outcome) -> String {
        let tx = &outcome.mapped.transaction;
        let mut block = String::new();
        let _ = writeln!(block, "{}", outcome.status.headline());
        let _ = writeln!(block, "{} {}", tx.kind, render_legs(tx));
        let _ = writeln!(block, "{}", render_accounts(tx));
        if !tx.description.is_empty() {
            let _ = writeln!(block, "{}", tx.description);
        }
        let _ = writeln!(block, "{}", tx.date.format("%Y-%m-%d %H:%M"));
        if !tx.duplicate_transactions.is_empty() {
            let _ = writeln!(block, "legs: {}", tx.duplicate_transactions.len() + 1);
        }
        block
    }

    fn render_matching(&self, title: &str, keep: impl Fn(&EntryStatus) -> bool) -> String {
        let blocks: Vec<String> = self
            .outcomes
            .iter()
            .filter(|o| keep(&o.status))
            .map(Self::render_outcome)
            .collect();
        if blocks.is_empty() {
            return format!("No {}.\n", title);
        }
        format!("{} ({}):\n\n{}", title, blocks.len(), blocks.join("\n"))
    }

    /// Header plus one block per transaction
    pub fn render(&self) -> String {
        let blocks: Vec<String> = self.outcomes.iter().map(Self::render_outcome).collect();
        if blocks.is_empty() {
            return format!("{}\nNothing to import.\n", self.header());
        }
        format!("{}\n{}", self.header(), blocks.join("\n"))
    }

    pub fn render_duplicates(&self) -> String {
        self.render_matching("duplicates", |s| matches!(s, EntryStatus::Duplicate))
    }

    pub fn render_errors(&self) -> String {
        self.render_matching("errors", |s| matches!(s, EntryStatus::Error(_)))
    }

    /// Header counts plus the pending record count
    pub fn render_stat(&self) -> String {
        format!(
            "{}pending records: {} ({})\n",
            self.header(),
            self.pending_records,
            self.source
        )
    }
}
