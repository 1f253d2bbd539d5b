//! Revolut transaction JSON, one object per record
//!
//! Amounts are integers in minor units; `startedDate` is epoch millis.

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::Parser;
use crate::error::{RecordError, Result};
use crate::models::{Record, Transaction, TransactionSource, TransactionType};

const SAVINGS_TAG: &str = "savings";
const DEPOSITING_SAVINGS: &str = "Depositing savings";
const WITHDRAWING_SAVINGS: &str = "Withdrawing savings";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevolutTransaction {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tag: Option<String>,
    account: AccountRef,
    #[serde(default)]
    recipient: Option<Party>,
    #[serde(default)]
    sender: Option<Party>,
    #[serde(default)]
    counterpart: Option<Counterpart>,
    started_date: i64,
}

#[derive(Debug, Deserialize)]
struct AccountRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Party {
    #[serde(default)]
    account: Option<AccountRef>,
}

#[derive(Debug, Deserialize)]
struct Counterpart {
    amount: i64,
    currency: String,
}

fn minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2).abs()
}

fn party_account(party: &Option<Party>) -> String {
    party
        .as_ref()
        .and_then(|p| p.account.as_ref())
        .map(|a| a.id.clone())
        .unwrap_or_default()
}

pub struct RevolutParser {
    transfer_to: Regex,
}

impl RevolutParser {
    pub fn new() -> Self {
        Self {
            transfer_to: Regex::new(r"^To (.*)$").expect("valid regex"),
        }
    }

    fn parse_record(&self, record: &Record) -> std::result::Result<Transaction, RecordError> {
        let item: RevolutTransaction = serde_json::from_slice(record.payload.as_bytes())
            .map_err(|e| RecordError::parse(format!("invalid revolut record: {}", e)))?;

        let mut tx = Transaction::from_record(record);
        // Savings legs share this id; the merger pairs them by it
        tx.id = item.id.clone();
        tx.date = DateTime::<Utc>::from_timestamp_millis(item.started_date)
            .ok_or_else(|| RecordError::parse(format!("invalid startedDate {}", item.started_date)))?;
        tx.description = item.description.clone();
        tx.original_tx_type = item.kind.clone();
        tx.deduplication_key = format!("{}_{}_{}", item.id, item.amount, item.currency);

        let amount = minor_units(item.amount);
        let is_savings = item.tag.as_deref() == Some(SAVINGS_TAG)
            && (item.description == DEPOSITING_SAVINGS || item.description == WITHDRAWING_SAVINGS);

        match item.kind.as_str() {
            "CARD_PAYMENT" => {
                tx.kind = TransactionType::Expense;
                tx.source_amount = amount;
                tx.source_currency = item.currency.clone();
                tx.source_account = item.account.id.clone();
                match &item.counterpart {
                    Some(cp) if cp.amount != 0 => {
                        tx.destination_amount = minor_units(cp.amount);
                        tx.destination_currency = cp.currency.clone();
                    }
                    _ => {
                        tx.destination_amount = amount;
                        tx.destination_currency = item.currency.clone();
                    }
                }
            }
            "TRANSFER" if is_savings => {
                tx.kind = TransactionType::InternalTransfer;
                tx.original_counterpart_name = SAVINGS_TAG.to_string();
                // The debited side is the local account when depositing and
                // the savings pocket when withdrawing; either way it is the
                // leg with the negative amount.
                if item.amount < 0 {
                    tx.internal_transfer_direction_to = true;
                    tx.source_amount = amount;
                    tx.source_currency = item.currency.clone();
                    tx.source_account = item.account.id.clone();
                    tx.destination_account = party_account(&item.recipient);
                } else {
                    tx.destination_amount = amount;
                    tx.destination_currency = item.currency.clone();
                    tx.destination_account = item.account.id.clone();
                    tx.source_account = party_account(&item.sender);
                }
            }
            "TRANSFER" => {
                let caps = self
                    .transfer_to
                    .captures(&item.description)
                    .ok_or_else(|| RecordError::parse("expected 2 matches"))?;
                tx.kind = TransactionType::RemoteTransfer;
                tx.source_amount = amount;
                tx.source_currency = item.currency.clone();
                tx.source_account = item.account.id.clone();
                tx.destination_account = caps[1].trim().to_string();
                tx.original_counterpart_name = tx.destination_account.clone();
            }
            other => {
                return Err(RecordError::parse(format!(
                    "unsupported revolut operation type {}",
                    other
                )))
            }
        }

        Ok(tx)
    }
}

impl Default for RevolutParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for RevolutParser {
    fn source(&self) -> TransactionSource {
        TransactionSource::Revolut
    }

    fn parse(&self, records: &[Record]) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = records
            .iter()
            .map(|record| {
                self.parse_record(record)
                    .unwrap_or_else(|err| Transaction::failed(record, err))
            })
            .collect();

        debug!("Parsed {} revolut transactions", transactions.len());
        Ok(transactions)
    }
}
