//! Test utilities for firefeed-core
//!
//! In-process fakes for the ledger and chat collaborators, plus a mock
//! Firefly III HTTP server for exercising the real client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::sync::oneshot;

use crate::chat::ChatApi;
use crate::error::{Error, Result};
use crate::ledger::{Ledger, TransactionRequest};
use crate::models::Account;

/// In-memory ledger that records created transactions
#[derive(Default)]
pub struct MockLedger {
    accounts: Mutex<Vec<Account>>,
    created: Mutex<Vec<TransactionRequest>>,
    reject: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            ..Default::default()
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    /// Fail `create_transaction` for splits with this description
    pub fn reject_description(&self, description: &str) {
        *self.reject.lock().unwrap() = Some(description.to_string());
    }

    pub fn created(&self) -> Vec<TransactionRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn create_transaction(&self, request: &TransactionRequest) -> Result<()> {
        let reject = self.reject.lock().unwrap().clone();
        if let Some(reject) = reject {
            if request.transactions.iter().any(|s| s.description == reject) {
                return Err(Error::Ledger(
                    "ledger API error 422 Unprocessable Entity: rejected".to_string(),
                ));
            }
        }
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// In-memory chat that records replies and reactions
#[derive(Default)]
pub struct MockChat {
    sent: Mutex<Vec<(i64, String)>>,
    reactions: Mutex<Vec<(i64, i64, String)>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_reactions: AtomicBool,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `file_id`
    pub fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes);
    }

    pub fn fail_reactions(&self) {
        self.fail_reactions.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reactions(&self) -> Vec<(i64, i64, String)> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn set_reaction(&self, chat_id: i64, message_id: i64, emoji: &str) -> Result<()> {
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(Error::Chat("reactions are disabled".to_string()));
        }
        self.reactions
            .lock()
            .unwrap()
            .push((chat_id, message_id, emoji.to_string()));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::Chat(format!("unknown file {}", file_id)))
    }
}

struct FireflyState {
    accounts: Vec<Account>,
    created: Mutex<Vec<TransactionRequest>>,
}

/// Mock Firefly III server for testing the HTTP client
pub struct MockFireflyServer {
    addr: SocketAddr,
    state: Arc<FireflyState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockFireflyServer {
    /// Bearer token the server accepts
    pub const TOKEN: &'static str = "test-token";

    /// Transactions with this description are rejected with 422
    pub const REJECT: &'static str = "reject me";

    /// Start the mock server on an available port
    pub async fn start(accounts: Vec<Account>) -> Self {
        let state = Arc::new(FireflyState {
            accounts,
            created: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/v1/accounts", get(handle_accounts))
            .route("/api/v1/transactions", post(handle_create))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Transaction requests accepted so far
    pub fn created(&self) -> Vec<TransactionRequest> {
        self.state.created.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockFireflyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", MockFireflyServer::TOKEN))
        .unwrap_or(false)
}

async fn handle_accounts(
    State(state): State<Arc<FireflyState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthenticated."})),
        );
    }

    let data: Vec<_> = state
        .accounts
        .iter()
        .map(|a| {
            json!({
                "type": "accounts",
                "id": a.id,
                "attributes": {
                    "name": a.name,
                    "account_number": a.account_number,
                    "current_balance": a.current_balance.map(|b| b.to_string()),
                    "currency_id": a.currency_id,
                }
            })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "data": data })))
}

async fn handle_create(
    State(state): State<Arc<FireflyState>>,
    headers: HeaderMap,
    Json(request): Json<TransactionRequest>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthenticated."})),
        );
    }

    if request
        .transactions
        .iter()
        .any(|s| s.description == MockFireflyServer::REJECT)
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Duplicate of transaction #1."})),
        );
    }

    state.created.lock().unwrap().push(request);
    (StatusCode::OK, Json(json!({"data": {"type": "transactions", "id": "1"}})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ledger_records_and_rejects() {
        let ledger = MockLedger::new(Vec::new());
        ledger.reject_description("bad");
        let split = |d: &str| crate::ledger::TransactionSplit {
            kind: crate::ledger::LedgerTransactionType::Deposit,
            date: "2024-01-01T00:00:00+00:00".into(),
            amount: "1.00".into(),
            currency_code: "EUR".into(),
            foreign_amount: None,
            foreign_currency_code: None,
            description: d.into(),
            source_id: None,
            source_name: Some("x".into()),
            destination_id: Some("1".into()),
            destination_name: None,
            notes: String::new(),
            external_id: None,
        };

        ledger
            .create_transaction(&TransactionRequest::single(split("ok")))
            .await
            .unwrap();
        assert!(ledger
            .create_transaction(&TransactionRequest::single(split("bad")))
            .await
            .is_err());
        assert_eq!(ledger.created().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_chat() {
        let chat = MockChat::new();
        chat.add_file("f1", b"abc".to_vec());
        assert_eq!(chat.download_file("f1").await.unwrap(), b"abc");
        assert!(chat.download_file("f2").await.is_err());

        chat.set_reaction(1, 2, "👍").await.unwrap();
        chat.fail_reactions();
        assert!(chat.set_reaction(1, 3, "👍").await.is_err());
        assert_eq!(chat.reactions(), vec![(1, 2, "👍".to_string())]);
    }
}
