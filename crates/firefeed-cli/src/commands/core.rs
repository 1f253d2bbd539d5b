//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `build_pipeline` - Pipeline over the configured stores
//! - `cmd_init` - Initialize the database

use std::sync::Arc;

use anyhow::{Context, Result};
use firefeed_core::ledger::Ledger;
use firefeed_core::store::open_stores;
use firefeed_core::{Config, Database, Pipeline};

/// Open the database, encrypted when FIREFEED_DB_KEY is set
pub fn open_db(config: &Config) -> Result<Database> {
    Database::from_config(config).context("Failed to open database")
}

/// Pipeline over the record stores selected by configuration
pub fn build_pipeline(config: &Config, ledger: Arc<dyn Ledger>) -> Result<Pipeline> {
    let (messages, fingerprints) = open_stores(config).context("Failed to open record stores")?;
    Ok(Pipeline::new(ledger, messages, fingerprints))
}

pub fn cmd_init(config: &Config) -> Result<()> {
    println!("🔧 Initializing database at {}...", config.db_path.display());

    let db = open_db(config)?;
    let migrations = db
        .applied_migrations()
        .context("Failed to read migrations")?;
    println!("   Applied migrations: {}", migrations.join(", "));

    if config.db_key.is_some() {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   ⚠️  Encryption: DISABLED (set FIREFEED_DB_KEY)");
    }

    if let Some(dir) = &config.document_dir {
        println!("   📁 Records: document store at {}", dir.display());
    }

    if config.chat_sources.is_empty() {
        println!("   ⚠️  No chats mapped (set FIREFEED_CHAT_SOURCES or firefeed.toml)");
    } else {
        println!("   💬 Mapped chats: {}", config.chat_sources.len());
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Store a statement: firefeed import --chat <id> --file statement.csv");
    println!("  2. Preview it: firefeed run dry --chat <id>");
    println!("  3. Start the webhook: firefeed serve");

    Ok(())
}
