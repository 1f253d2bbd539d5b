//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use firefeed_core::pipeline::Command;

/// Firefeed - Import bank notifications and statements into your ledger
#[derive(Parser)]
#[command(name = "firefeed")]
#[command(about = "Bank message to ledger importer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides FIREFEED_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the chat webhook server
    Serve {
        /// Port to listen on (defaults to FUNCTIONS_CUSTOMHANDLER_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Disable the webhook api_key check (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        #[arg(long)]
        no_auth: bool,
    },

    /// Store a statement file as records for a chat
    Import {
        /// Chat the records belong to
        #[arg(short, long, allow_hyphen_values = true)]
        chat: i64,

        /// Statement file (CSV, XLSX, JSON or a text message)
        #[arg(short, long)]
        file: PathBuf,

        /// Message id for the records (defaults to the current unix time)
        #[arg(long)]
        message_id: Option<i64>,
    },

    /// Run a chat command over the pending records and print the reply
    Run {
        /// Command to run
        #[arg(value_enum)]
        command: RunCommand,

        /// Chat whose records to process
        #[arg(short, long, allow_hyphen_values = true)]
        chat: i64,
    },

    /// Drop every stored record of a chat
    Clear {
        /// Chat to clear
        #[arg(short, long, allow_hyphen_values = true)]
        chat: i64,
    },

    /// Mirror ledger account balances into the snapshot tables
    Snapshot,
}

/// Pipeline commands available from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunCommand {
    Dry,
    Commit,
    Duplicates,
    Errors,
    Stat,
}

impl From<RunCommand> for Command {
    fn from(command: RunCommand) -> Self {
        match command {
            RunCommand::Dry => Command::Dry,
            RunCommand::Commit => Command::Commit,
            RunCommand::Duplicates => Command::Duplicates,
            RunCommand::Errors => Command::Errors,
            RunCommand::Stat => Command::Stat,
        }
    }
}
