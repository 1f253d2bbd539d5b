//! PrivatBank SMS-style notifications
//!
//! ```text
//! 1.33USD Розваги. Steam
//! 4*71 16:27
//! Бал. 1.55USD
//! ```

use regex::Regex;
use tracing::debug;

use super::{parse_amount, Parser};
use crate::error::{RecordError, Result};
use crate::models::{Record, RecordPayload, Transaction, TransactionSource, TransactionType};

const TRANSFER_TO_OWN_CARD: &str = "переказ на свою карту";
const TRANSFER_FROM_OWN_CARD: &str = "переказ зі своєї карти";
const TRANSFER_VIA_PRIVAT: &str = "переказ через приват";

pub struct PrivatbankParser {
    amount_line: Regex,
    card_line: Regex,
    partner_mask: Regex,
}

impl PrivatbankParser {
    pub fn new() -> Self {
        Self {
            amount_line: Regex::new(r"^([\d.,]+)([A-Z]{3}) (.+)$").expect("valid regex"),
            card_line: Regex::new(r"^(\S+) (\d{2}:\d{2})$").expect("valid regex"),
            partner_mask: Regex::new(r"(\d)\d\*\*(\d{2})").expect("valid regex"),
        }
    }

    fn parse_record(&self, record: &Record) -> std::result::Result<Transaction, RecordError> {
        let text = match &record.payload {
            RecordPayload::Text(text) => text.as_str(),
            RecordPayload::Binary(_) => {
                return Err(RecordError::parse("documents are not supported for privatbank"))
            }
        };

        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() < 3 {
            return Err(RecordError::parse(format!(
                "expected 3 lines, got {}",
                lines.len()
            )));
        }

        let caps = self
            .amount_line
            .captures(lines[0])
            .ok_or_else(|| RecordError::parse(format!("unexpected first line: {}", lines[0])))?;
        let amount = parse_amount(&caps[1])?.abs();
        let currency = caps[2].to_string();
        let description = caps[3].trim().to_string();

        let caps = self
            .card_line
            .captures(lines[1])
            .ok_or_else(|| RecordError::parse(format!("unexpected second line: {}", lines[1])))?;
        let card = caps[1].to_string();
        let time = caps[2].to_string();

        let mut tx = Transaction::from_record(record);
        tx.description = description.clone();
        tx.date_from_message = time;
        tx.original_tx_type = description.clone();
        tx.deduplication_key = format!("{}_{}", text, record.date.to_rfc3339());

        let lowered = description.to_lowercase();
        if lowered.contains(TRANSFER_TO_OWN_CARD) {
            // Debit side: money leaves this card towards the partner card
            let partner = self.partner(&description)?;
            tx.kind = TransactionType::InternalTransfer;
            tx.internal_transfer_direction_to = true;
            tx.source_amount = amount;
            tx.source_currency = currency;
            tx.source_account = card;
            tx.destination_account = partner;
        } else if lowered.contains(TRANSFER_FROM_OWN_CARD) {
            // Credit side: money arrives on this card from the partner card
            let partner = self.partner(&description)?;
            tx.kind = TransactionType::InternalTransfer;
            tx.destination_amount = amount;
            tx.destination_currency = currency;
            tx.destination_account = card;
            tx.source_account = partner;
        } else if lowered.contains(TRANSFER_VIA_PRIVAT) {
            tx.kind = TransactionType::RemoteTransfer;
            tx.source_amount = amount;
            tx.source_currency = currency;
            tx.source_account = card;
        } else {
            tx.kind = TransactionType::Expense;
            tx.source_amount = amount;
            tx.source_currency = currency;
            tx.source_account = card;
        }

        Ok(tx)
    }

    /// Partner card `51**20` in the local `5*20` mask format
    fn partner(&self, description: &str) -> std::result::Result<String, RecordError> {
        self.partner_mask
            .captures(description)
            .map(|caps| format!("{}*{}", &caps[1], &caps[2]))
            .ok_or_else(|| RecordError::parse("partner card not found in description"))
    }
}

impl Default for PrivatbankParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PrivatbankParser {
    fn source(&self) -> TransactionSource {
        TransactionSource::Privatbank
    }

    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = records
            .iter()
            .map(|record| {
                self.parse_record(record)
                    .unwrap_or_else(|err| Transaction::failed(record, err))
            })
            .collect();

        debug!("Parsed {} privatbank transactions", transactions.len());
        Ok(transactions)
    }
}
