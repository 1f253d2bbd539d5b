//! Server command implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use firefeed_core::ledger::Ledger;
use firefeed_core::{Config, FireflyClient, TelegramClient};
use firefeed_server::{start_snapshot_scheduler, AppState, ServerConfig, SnapshotScheduleConfig};

use super::{build_pipeline, open_db};

pub async fn cmd_serve(config: Config, host: &str, port: Option<u16>, no_auth: bool) -> Result<()> {
    let port = port.unwrap_or(config.port);

    println!("🚀 Starting firefeed webhook...");
    match &config.document_dir {
        Some(dir) => println!("   Records: {}", dir.display()),
        None => println!("   Database: {}", config.db_path.display()),
    }
    println!("   Listening: http://{}:{}/api/telegram", host, port);
    println!("   Mapped chats: {}", config.chat_sources.len());
    println!("   Request deadline: {}s", config.timeout.as_secs());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if config.api_key.is_some() {
        println!("   🔑 Authentication: api_key query parameter (FIREFEED_API_KEY)");
    }

    let ledger: Arc<dyn Ledger> =
        Arc::new(FireflyClient::from_config(&config).context("Ledger client not configured")?);
    let chat = TelegramClient::from_config(&config).context("Chat client not configured")?;
    let pipeline = build_pipeline(&config, ledger.clone())?;

    if let Some(schedule) = SnapshotScheduleConfig::from_config(&config) {
        println!("   📸 Balance snapshots: every {}h", schedule.interval_hours);
        start_snapshot_scheduler(ledger, open_db(&config)?, schedule);
    }

    println!();
    println!("   Press Ctrl+C to stop");

    let state = AppState {
        pipeline,
        chat: Arc::new(chat),
        chat_sources: config.chat_sources.clone(),
        config: ServerConfig {
            require_auth: !no_auth,
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        },
    };

    firefeed_server::serve(state, host, port).await
}
