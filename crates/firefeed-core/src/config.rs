//! Runtime configuration
//!
//! Built once from environment variables and handed to the server/CLI by
//! value. The `chat_id -> source` mapping comes from a TOML file
//! (`FIREFEED_CONFIG`, default `firefeed.toml`) optionally overridden by the
//! inline `FIREFEED_CHAT_SOURCES` variable:
//!
//! ```toml
//! [chats]
//! "-1001" = "privatbank"
//! "-1002" = "mono"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::TransactionSource;

/// Default per-call and per-request deadline
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default port for the webhook server
pub const DEFAULT_PORT: u16 = 3000;

/// Mapping from chat id to the source declared for that chat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSources {
    chats: BTreeMap<i64, TransactionSource>,
}

#[derive(Debug, Deserialize)]
struct ChatSourcesFile {
    #[serde(default)]
    chats: BTreeMap<String, String>,
}

impl ChatSources {
    pub fn new(chats: BTreeMap<i64, TransactionSource>) -> Self {
        Self { chats }
    }

    /// Parse the TOML mapping file contents
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ChatSourcesFile = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("invalid chat mapping file: {}", e)))?;

        let mut chats = BTreeMap::new();
        for (chat, source) in file.chats {
            let chat_id = chat
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid chat id: {}", chat)))?;
            chats.insert(chat_id, source.parse()?);
        }
        Ok(Self { chats })
    }

    /// Parse the inline `chat=source,chat=source` form
    pub fn from_inline(input: &str) -> Result<Self> {
        let mut chats = BTreeMap::new();
        for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (chat, source) = entry
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid chat mapping entry: {}", entry)))?;
            let chat_id = chat
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid chat id: {}", chat)))?;
            chats.insert(chat_id, source.parse()?);
        }
        Ok(Self { chats })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Later entries win
    pub fn merge(&mut self, other: ChatSources) {
        self.chats.extend(other.chats);
    }

    pub fn insert(&mut self, chat_id: i64, source: TransactionSource) {
        self.chats.insert(chat_id, source);
    }

    /// Source declared for a chat; unmapped chats are a configuration error
    pub fn source_for(&self, chat_id: i64) -> Result<TransactionSource> {
        self.chats
            .get(&chat_id)
            .copied()
            .ok_or_else(|| Error::Config(format!("no source configured for chat {}", chat_id)))
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub firefly_endpoint: Option<String>,
    pub firefly_token: Option<String>,
    pub telegram_token: Option<String>,
    /// Shared secret expected in the webhook `api_key` query parameter
    pub api_key: Option<String>,
    pub db_path: PathBuf,
    pub db_key: Option<String>,
    /// Use the JSON document record store in this directory instead of SQLite
    pub document_dir: Option<PathBuf>,
    pub chat_sources: ChatSources,
    pub port: u16,
    pub timeout: Duration,
    pub snapshot_interval_hours: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firefly_endpoint: None,
            firefly_token: None,
            telegram_token: None,
            api_key: None,
            db_path: PathBuf::from("firefeed.db"),
            db_key: None,
            document_dir: None,
            chat_sources: ChatSources::default(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            snapshot_interval_hours: None,
        }
    }
}

fn env_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config_path = env_var(&["FIREFEED_CONFIG"])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("firefeed.toml"));

        let mut chat_sources = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading chat mapping");
            ChatSources::load(&config_path)?
        } else {
            ChatSources::default()
        };
        if let Some(inline) = env_var(&["FIREFEED_CHAT_SOURCES"]) {
            chat_sources.merge(ChatSources::from_inline(&inline)?);
        }
        if chat_sources.is_empty() {
            warn!("No chat -> source mapping configured; incoming messages will be rejected");
        }

        let port = match env_var(&["FUNCTIONS_CUSTOMHANDLER_PORT"]) {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {}", p)))?,
            None => defaults.port,
        };

        let timeout = match env_var(&["FIREFEED_REQUEST_TIMEOUT_SECS"]) {
            Some(s) => Duration::from_secs(
                s.parse()
                    .map_err(|_| Error::Config(format!("invalid timeout: {}", s)))?,
            ),
            None => defaults.timeout,
        };

        let snapshot_interval_hours = env_var(&["FIREFEED_SNAPSHOT_INTERVAL_HOURS"])
            .and_then(|s| s.parse().ok())
            .filter(|h: &u64| *h > 0);

        Ok(Self {
            firefly_endpoint: env_var(&["FIREFLY_API_ENDPOINT"]),
            firefly_token: env_var(&["FIREFLY_API_KEY"]),
            telegram_token: env_var(&["TELEGRAM_BOT_TOKEN"]),
            api_key: env_var(&["FIREFEED_API_KEY", "API_KEY"]),
            db_path: env_var(&["FIREFEED_DB", "DB_NAME"])
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            db_key: env_var(&["FIREFEED_DB_KEY"]),
            document_dir: env_var(&["FIREFEED_DOCUMENT_DIR"]).map(PathBuf::from),
            chat_sources,
            port,
            timeout,
            snapshot_interval_hours,
        })
    }
}
