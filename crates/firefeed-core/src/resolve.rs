//! Account resolution against the ledger catalog
//!
//! Maps the account strings parsers produce (masked cards, IBAN fragments,
//! synthetic `mono_UAH` names) onto catalog accounts and builds the ledger
//! payload for every transaction that resolves.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::dedup::fingerprint;
use crate::error::{Error, RecordError, Result};
use crate::ledger::{LedgerTransactionType, TransactionRequest, TransactionSplit};
use crate::models::{Account, Transaction, TransactionType};

/// Lookup from account-number tokens to catalog accounts
#[derive(Debug, Clone, Default)]
pub struct AccountCatalog {
    by_token: HashMap<String, Account>,
}

impl AccountCatalog {
    /// Index every comma-separated `account_number` token
    ///
    /// Tokens are matched case-insensitively. A token claimed by two catalog
    /// accounts is a configuration error.
    pub fn new(accounts: &[Account]) -> Result<Self> {
        let mut by_token: HashMap<String, Account> = HashMap::new();

        for account in accounts {
            for token in account
                .account_number
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
            {
                if let Some(existing) = by_token.get(&token) {
                    if existing.id != account.id {
                        return Err(Error::Config(format!(
                            "account number {} is used by both {} and {}",
                            token, existing.name, account.name
                        )));
                    }
                    continue;
                }
                by_token.insert(token, account.clone());
            }
        }

        debug!("Indexed {} catalog account tokens", by_token.len());
        Ok(Self { by_token })
    }

    pub fn lookup(&self, token: &str) -> Option<&Account> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        self.by_token.get(&token.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

/// A transaction with either a ready ledger payload or an error
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTransaction {
    pub transaction: Transaction,
    pub request: Option<TransactionRequest>,
    pub error: Option<RecordError>,
}

impl MappedTransaction {
    pub fn is_ready(&self) -> bool {
        self.request.is_some() && self.error.is_none()
    }
}

/// Two-decimal fixed string, half away from zero
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

struct Side {
    id: Option<String>,
    name: Option<String>,
}

impl Side {
    fn resolved(account: &Account) -> Self {
        Self {
            id: Some(account.id.clone()),
            name: Some(account.name.clone()),
        }
    }

    fn named(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
        }
    }
}

fn required<'a>(catalog: &'a AccountCatalog, account: &str) -> std::result::Result<&'a Account, RecordError> {
    catalog
        .lookup(account)
        .ok_or_else(|| RecordError::AccountNotFound(account.to_string()))
}

/// Resolved account, or a name for the ledger to create from
fn optional(catalog: &AccountCatalog, account: &str, fallback: &str) -> Side {
    match catalog.lookup(account) {
        Some(found) => Side::resolved(found),
        None if !account.trim().is_empty() => Side::named(account.trim()),
        None => Side::named(fallback),
    }
}

fn build_split(
    tx: &Transaction,
    catalog: &AccountCatalog,
) -> std::result::Result<TransactionSplit, RecordError> {
    let description = if tx.description.trim().is_empty() {
        if tx.original_tx_type.is_empty() {
            tx.transaction_source.to_string()
        } else {
            tx.original_tx_type.clone()
        }
    } else {
        tx.description.trim().to_string()
    };
    let counterpart = if tx.original_counterpart_name.is_empty() {
        description.as_str()
    } else {
        tx.original_counterpart_name.as_str()
    };

    let (kind, source, destination) = match tx.kind {
        TransactionType::Expense | TransactionType::RemoteTransfer => {
            let source = Side::resolved(required(catalog, &tx.source_account)?);
            let destination = optional(catalog, &tx.destination_account, counterpart);
            (LedgerTransactionType::Withdrawal, source, destination)
        }
        TransactionType::Income => {
            let destination = Side::resolved(required(catalog, &tx.destination_account)?);
            let source = optional(catalog, &tx.source_account, counterpart);
            (LedgerTransactionType::Deposit, source, destination)
        }
        TransactionType::InternalTransfer => {
            let source = Side::resolved(required(catalog, &tx.source_account)?);
            let destination = Side::resolved(required(catalog, &tx.destination_account)?);
            (LedgerTransactionType::Transfer, source, destination)
        }
        TransactionType::Unknown => {
            return Err(RecordError::parse("transaction type is unknown"));
        }
    };

    // Deposits are booked in the credited currency, everything else in the
    // debited one; the other leg becomes the foreign amount.
    let use_destination = kind == LedgerTransactionType::Deposit || !tx.has_source_leg();
    let (amount, currency, foreign) = if use_destination {
        let foreign = (tx.has_source_leg() && tx.source_currency != tx.destination_currency)
            .then(|| (tx.source_amount, tx.source_currency.clone()));
        (tx.destination_amount, tx.destination_currency.clone(), foreign)
    } else {
        let foreign = (tx.has_destination_leg() && tx.destination_currency != tx.source_currency)
            .then(|| (tx.destination_amount, tx.destination_currency.clone()));
        (tx.source_amount, tx.source_currency.clone(), foreign)
    };

    if amount <= Decimal::ZERO || currency.is_empty() {
        return Err(RecordError::parse("transaction has no amount"));
    }

    let external_id = (!tx.deduplication_key.is_empty()).then(|| fingerprint(&tx.deduplication_key));

    Ok(TransactionSplit {
        kind,
        date: tx.date.to_rfc3339(),
        amount: format_amount(amount),
        currency_code: currency,
        foreign_amount: foreign.as_ref().map(|(a, _)| format_amount(*a)),
        foreign_currency_code: foreign.map(|(_, c)| c),
        description,
        source_id: source.id,
        source_name: source.name,
        destination_id: destination.id,
        destination_name: destination.name,
        notes: tx.raw.clone(),
        external_id,
    })
}

/// Map parsed transactions onto the catalog
///
/// Transactions that already carry a parsing error pass through with it.
pub fn map_transactions(
    transactions: Vec<Transaction>,
    catalog: &AccountCatalog,
) -> Vec<MappedTransaction> {
    transactions
        .into_iter()
        .map(|tx| {
            if let Some(err) = tx.parsing_error.clone() {
                return MappedTransaction {
                    transaction: tx,
                    request: None,
                    error: Some(err),
                };
            }
            match build_split(&tx, catalog) {
                Ok(split) => MappedTransaction {
                    transaction: tx,
                    request: Some(TransactionRequest::single(split)),
                    error: None,
                },
                Err(err) => MappedTransaction {
                    transaction: tx,
                    request: None,
                    error: Some(err),
                },
            }
        })
        .collect()
}
