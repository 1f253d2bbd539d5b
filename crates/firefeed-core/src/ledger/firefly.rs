//! Firefly III REST client
//!
//! # Configuration
//!
//! Environment variables:
//! - `FIREFLY_API_ENDPOINT`: Base URL of the Firefly III instance
//! - `FIREFLY_API_KEY`: Personal access token

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Ledger, TransactionRequest};
use crate::config::{Config, DEFAULT_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::models::Account;

#[derive(Debug, Clone)]
pub struct FireflyClient {
    http_client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct AccountList {
    data: Vec<AccountEnvelope>,
}

#[derive(Debug, Deserialize)]
struct AccountEnvelope {
    id: String,
    attributes: AccountAttributes,
}

#[derive(Debug, Deserialize)]
struct AccountAttributes {
    name: String,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    current_balance: Option<String>,
    #[serde(default)]
    currency_id: Option<String>,
}

impl From<AccountEnvelope> for Account {
    fn from(envelope: AccountEnvelope) -> Self {
        let attrs = envelope.attributes;
        let current_balance = attrs.current_balance.as_deref().and_then(|b| {
            Decimal::from_str(b)
                .map_err(|_| warn!(account = %envelope.id, balance = b, "Unparseable balance"))
                .ok()
        });
        Account {
            id: envelope.id,
            name: attrs.name,
            account_number: attrs.account_number.unwrap_or_default(),
            current_balance,
            currency_id: attrs.currency_id,
        }
    }
}

impl FireflyClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from process configuration, failing when the ledger is not configured
    pub fn from_config(config: &Config) -> Result<Self> {
        match (&config.firefly_endpoint, &config.firefly_token) {
            (Some(endpoint), Some(token)) => {
                Ok(Self::new(endpoint, token).with_timeout(config.timeout))
            }
            _ => Err(Error::Config(
                "FIREFLY_API_ENDPOINT and FIREFLY_API_KEY must be set".to_string(),
            )),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Ledger(format!("ledger API error {}: {}", status, body)))
    }
}

#[async_trait]
impl Ledger for FireflyClient {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let response = self
            .http_client
            .get(format!("{}/api/v1/accounts", self.base_url))
            .query(&[("limit", "100500")])
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let list: AccountList = Self::check(response).await?.json().await?;
        debug!("Fetched {} ledger accounts", list.data.len());
        Ok(list.data.into_iter().map(Account::from).collect())
    }

    async fn create_transaction(&self, request: &TransactionRequest) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}/api/v1/transactions", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerTransactionType, TransactionSplit};
    use crate::test_utils::MockFireflyServer;

    fn split(description: &str) -> TransactionSplit {
        TransactionSplit {
            kind: LedgerTransactionType::Withdrawal,
            date: "2024-01-01T00:00:00+00:00".into(),
            amount: "1.00".into(),
            currency_code: "UAH".into(),
            foreign_amount: None,
            foreign_currency_code: None,
            description: description.into(),
            source_id: Some("1".into()),
            source_name: None,
            destination_id: None,
            destination_name: Some("Shop".into()),
            notes: String::new(),
            external_id: None,
        }
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let server = MockFireflyServer::start(vec![Account {
            id: "1".into(),
            name: "Privat UAH".into(),
            account_number: "4*68, UA1230".into(),
            current_balance: Some(Decimal::new(1881, 2)),
            currency_id: Some("3".into()),
        }])
        .await;

        let client = FireflyClient::new(&server.url(), MockFireflyServer::TOKEN);
        let accounts = client.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_number, "4*68, UA1230");
        assert_eq!(accounts[0].current_balance, Some(Decimal::new(1881, 2)));
    }

    #[tokio::test]
    async fn test_create_transaction() {
        let server = MockFireflyServer::start(Vec::new()).await;
        let client = FireflyClient::new(&server.url(), MockFireflyServer::TOKEN);

        client
            .create_transaction(&TransactionRequest::single(split("coffee")))
            .await
            .unwrap();

        let created = server.created();
        assert_eq!(created.len(), 1);
        assert!(created[0].error_if_duplicate_hash);
        assert_eq!(created[0].transactions[0].description, "coffee");
    }

    #[tokio::test]
    async fn test_error_status_becomes_ledger_error() {
        let server = MockFireflyServer::start(Vec::new()).await;
        let client = FireflyClient::new(&server.url(), MockFireflyServer::TOKEN);

        let err = client
            .create_transaction(&TransactionRequest::single(split(MockFireflyServer::REJECT)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ledger(msg) if msg.contains("422")));
    }

    #[test]
    fn test_from_config_requires_endpoint_and_token() {
        let mut config = Config::default();
        assert!(matches!(
            FireflyClient::from_config(&config),
            Err(Error::Config(_))
        ));

        config.firefly_endpoint = Some("http://ledger.local/".into());
        config.firefly_token = Some("t".into());
        let client = FireflyClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://ledger.local");
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let server = MockFireflyServer::start(Vec::new()).await;
        let client = FireflyClient::new(&server.url(), "nope");
        assert!(matches!(
            client.list_accounts().await,
            Err(Error::Ledger(_))
        ));
    }
}
