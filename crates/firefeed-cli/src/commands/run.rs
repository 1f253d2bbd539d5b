//! Local pipeline commands

use std::sync::Arc;

use anyhow::{Context, Result};
use firefeed_core::ledger::Ledger;
use firefeed_core::store::open_stores;
use firefeed_core::{Command, Config, FireflyClient};

use super::build_pipeline;

/// Run a chat command against `ledger` and return the reply text
pub async fn run_command(
    config: &Config,
    ledger: Arc<dyn Ledger>,
    chat_id: i64,
    command: Command,
) -> Result<String> {
    let source = config.chat_sources.source_for(chat_id)?;
    let pipeline = build_pipeline(config, ledger)?;
    let reply = pipeline
        .execute(chat_id, source, command)
        .await
        .with_context(|| format!("Failed to run {}", command))?;
    Ok(reply)
}

pub async fn cmd_run(config: &Config, chat_id: i64, command: Command) -> Result<String> {
    let ledger = FireflyClient::from_config(config).context("Ledger client not configured")?;
    run_command(config, Arc::new(ledger), chat_id, command).await
}

/// Drop every stored record of a chat, returning how many were pending
pub fn clear_chat(config: &Config, chat_id: i64) -> Result<usize> {
    let (messages, _) = open_stores(config).context("Failed to open record stores")?;
    let pending = messages.latest_messages(chat_id)?.len();
    messages.clear(chat_id)?;
    Ok(pending)
}

pub fn cmd_clear(config: &Config, chat_id: i64) -> Result<()> {
    let pending = clear_chat(config, chat_id)?;
    println!("🗑  Cleared chat {} ({} pending records)", chat_id, pending);
    Ok(())
}
