//! Firefeed CLI - Bank message to ledger importer
//!
//! Usage:
//!   firefeed init                                  Initialize database
//!   firefeed serve --port 3000                     Start the chat webhook
//!   firefeed import --chat -1001 --file stmt.csv   Store a statement for a chat
//!   firefeed run dry --chat -1001                  Run a command locally
//!   firefeed snapshot                              Mirror account balances

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use firefeed_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Init => commands::cmd_init(&config),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(config, &host, port, no_auth).await,
        Commands::Import {
            chat,
            file,
            message_id,
        } => commands::cmd_import(&config, chat, &file, message_id),
        Commands::Run { command, chat } => {
            let reply = commands::cmd_run(&config, chat, command.into()).await?;
            print!("{}", reply);
            Ok(())
        }
        Commands::Clear { chat } => commands::cmd_clear(&config, chat),
        Commands::Snapshot => commands::cmd_snapshot(&config).await,
    }
}
