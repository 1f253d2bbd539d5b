//! Chat collaborator (Telegram Bot API)
//!
//! Incoming webhook updates are deserialized into [`Update`]; replies,
//! reactions and document downloads go through [`ChatApi`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_TIMEOUT_SECS};
use crate::error::{Error, Result};

/// Longest message the bot API accepts
pub const MESSAGE_LIMIT: usize = 4096;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix seconds
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub forward_origin: Option<ForwardOrigin>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardOrigin {
    pub date: i64,
    #[serde(default)]
    pub sender_user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Message {
    /// Original timestamp: the forward origin date when forwarded
    pub fn original_date(&self) -> DateTime<Utc> {
        let secs = self
            .forward_origin
            .as_ref()
            .map(|f| f.date)
            .unwrap_or(self.date);
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(|| {
            warn!(message_id = self.message_id, secs, "Message date out of range, using epoch");
            DateTime::<Utc>::default()
        })
    }

    pub fn forwarded_from(&self) -> Option<String> {
        self.forward_origin
            .as_ref()
            .and_then(|f| f.sender_user.as_ref())
            .and_then(|u| u.username.clone())
    }
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn set_reaction(&self, chat_id: i64, message_id: i64, emoji: &str) -> Result<()>;

    /// Download a document by its file id
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Send a reply of any length, split on line boundaries
    async fn send_long_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            self.send_message(chat_id, &chunk).await?;
        }
        Ok(())
    }
}

/// Split text into chunks of at most `limit` characters, preferring newlines
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // A single line longer than the limit is cut hard
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http_client: Client,
    api_url: String,
    token: String,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Point the client at another bot API host
    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from process configuration, failing when no bot token is set
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .telegram_token
            .as_deref()
            .map(|t| Self::new(t).with_timeout(config.timeout))
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN must be set".to_string()))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>> {
        let response = self
            .http_client
            .post(format!("{}/bot{}/{}", self.api_url, self.token, method))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|_| Error::Chat(format!("{} failed with {}: {}", method, status, text)))?;

        if !status.is_success() || !parsed.ok {
            return Err(Error::Chat(format!(
                "{} failed with {}: {}",
                method,
                status,
                parsed.description.unwrap_or(text)
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call::<serde_json::Value>("sendMessage", json!({"chat_id": chat_id, "text": text}))
            .await?;
        Ok(())
    }

    async fn set_reaction(&self, chat_id: i64, message_id: i64, emoji: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "setMessageReaction",
            json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reaction": [{"type": "emoji", "emoji": emoji}],
            }),
        )
        .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file: File = self
            .call("getFile", json!({"file_id": file_id}))
            .await?
            .ok_or_else(|| Error::Chat(format!("getFile returned nothing for {}", file_id)))?;
        let path = file
            .file_path
            .ok_or_else(|| Error::Chat(format!("file {} is not downloadable", file_id)))?;

        let response = self
            .http_client
            .get(format!("{}/file/bot{}/{}", self.api_url, self.token, path))
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Chat(format!(
                "file download failed with {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        debug!(file_id, size = bytes.len(), "Downloaded document");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_deserialize() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "date": 1700000100,
                "chat": {"id": -1001},
                "text": "1.33USD Steam",
                "forward_origin": {"type": "user", "date": 1700000000, "sender_user": {"username": "privat_bot"}}
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -1001);
        assert_eq!(message.original_date().timestamp(), 1700000000);
        assert_eq!(message.forwarded_from().as_deref(), Some("privat_bot"));
        assert!(message.document.is_none());
    }

    #[test]
    fn test_api_response_without_result() {
        let resp: ApiResponse<Vec<u8>> =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request: chat not found"}"#).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Bad Request: chat not found"));

        let resp: ApiResponse<bool> = serde_json::from_str(r#"{"ok":true,"result":true}"#).unwrap();
        assert_eq!(resp.result, Some(true));
    }

    #[test]
    fn test_out_of_range_date_falls_back_to_epoch() {
        let message: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": i64::MAX,
            "chat": {"id": 1}
        }))
        .unwrap();
        assert_eq!(message.original_date(), DateTime::<Utc>::default());
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_split_message_on_lines() {
        let chunks = split_message("aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc\n".to_string()]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_split_message_long_line() {
        let text = "ж".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }
}
