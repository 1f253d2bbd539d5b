//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, build_pipeline)
//! - `import` - Store a statement file as chat records
//! - `run` - Run pipeline commands locally (dry, commit, reports, clear)
//! - `serve` - Chat webhook server
//! - `snapshot` - Account balance snapshots

pub mod core;
pub mod import;
pub mod run;
pub mod serve;
pub mod snapshot;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use run::*;
pub use serve::*;
pub use snapshot::*;
