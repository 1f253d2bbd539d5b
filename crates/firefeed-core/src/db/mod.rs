//! SQLite persistence with connection pooling and versioned migrations
//!
//! This module is organized by domain:
//! - `messages` - raw chat record store
//! - `fingerprints` - deduplication fingerprints
//! - `balances` - account balance snapshot tables

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

mod balances;
mod fingerprints;
mod messages;

pub use balances::BalanceRow;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for the database encryption passphrase
pub const DB_KEY_ENV: &str = "FIREFEED_DB_KEY";

/// Ordered schema migrations; ids are never reused or reordered
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20240101_messages",
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            chat_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            part INTEGER NOT NULL DEFAULT 0,
            source TEXT NOT NULL,
            encoding TEXT NOT NULL,
            data TEXT NOT NULL,
            date DATETIME NOT NULL,
            forwarded_from TEXT,
            is_processed BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (chat_id, message_id, part)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pending ON messages(chat_id, is_processed);
        "#,
    ),
    (
        "20240101_fingerprints",
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            source TEXT NOT NULL,
            hash TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (source, hash)
        );
        "#,
    ),
    (
        "20240215_account_balances",
        r#"
        CREATE TABLE IF NOT EXISTS simple_account_data_importer (
            id TEXT PRIMARY KEY,
            balance TEXT NOT NULL,
            currency_id TEXT NOT NULL,
            updated_at DATETIME NOT NULL
        );
        "#,
    ),
    (
        "20240301_account_balances_daily",
        r#"
        CREATE TABLE IF NOT EXISTS simple_account_data_importer_daily (
            id TEXT NOT NULL,
            date DATE NOT NULL,
            balance TEXT NOT NULL,
            currency_id TEXT NOT NULL,
            updated_at DATETIME NOT NULL,
            PRIMARY KEY (id, date)
        );
        "#,
    ),
];

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the
/// same key regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate every existing encrypted database
    const APP_SALT: &[u8; 16] = b"firefeed-salt-v1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(output.as_bytes()))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Open a database, encrypted when a passphrase is given
    pub fn new(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open the database named by the process configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.db_path.to_string_lossy(), config.db_key.as_deref())
    }

    /// Open a database using the passphrase from `FIREFEED_DB_KEY`, if set
    pub fn open(path: &str) -> Result<Self> {
        let key = std::env::var(DB_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self::new(path, key.as_deref())
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "firefeed_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy(), None)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Ids of applied migrations, in application order
    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM migrations ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Apply pending migrations, each in its own transaction
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS migrations (
                id TEXT PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        for (id, sql) in MIGRATIONS {
            let applied: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM migrations WHERE id = ?)",
                params![id],
                |row| row.get(0),
            )?;
            if applied {
                continue;
            }

            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute("INSERT INTO migrations (id) VALUES (?)", params![id])?;
            tx.commit()?;
            info!(migration = id, "Applied migration");
        }

        debug!("Database schema up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
