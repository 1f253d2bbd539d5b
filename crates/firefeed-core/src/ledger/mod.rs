//! Bookkeeping ledger collaborator
//!
//! The pipeline only needs two calls: the account catalog and transaction
//! creation. [`FireflyClient`] speaks the Firefly III REST API; tests use
//! `test_utils::MockLedger`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Account;

mod firefly;

pub use firefly::FireflyClient;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current account catalog
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Create one transaction group
    async fn create_transaction(&self, request: &TransactionRequest) -> Result<()>;
}

/// Ledger-side transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerTransactionType {
    Withdrawal,
    Deposit,
    Transfer,
}

impl LedgerTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Withdrawal => "withdrawal",
            Self::Deposit => "deposit",
            Self::Transfer => "transfer",
        }
    }
}

/// One split of a ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSplit {
    #[serde(rename = "type")]
    pub kind: LedgerTransactionType,
    /// RFC3339
    pub date: String,
    /// Two-decimal fixed string
    pub amount: String,
    pub currency_code: String,
    pub foreign_amount: Option<String>,
    pub foreign_currency_code: Option<String>,
    pub description: String,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub destination_id: Option<String>,
    pub destination_name: Option<String>,
    pub notes: String,
    pub external_id: Option<String>,
}

/// Body of `POST /api/v1/transactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub error_if_duplicate_hash: bool,
    pub apply_rules: bool,
    pub fire_webhooks: bool,
    pub group_title: Option<String>,
    pub transactions: Vec<TransactionSplit>,
}

impl TransactionRequest {
    /// Single-split request with the ledger's duplicate-hash guard enabled
    pub fn single(split: TransactionSplit) -> Self {
        Self {
            error_if_duplicate_hash: true,
            apply_rules: true,
            fire_webhooks: true,
            group_title: None,
            transactions: vec![split],
        }
    }
}
