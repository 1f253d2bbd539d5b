//! Deduplication fingerprint store

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::TransactionSource;
use crate::store::FingerprintStore;

impl FingerprintStore for Database {
    fn get_duplicates(&self, hashes: &[String], source: TransactionSource) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM fingerprints WHERE source = ? AND hash = ?)")?;

        let mut found = Vec::new();
        for hash in hashes {
            let exists: bool = stmt.query_row(params![source.as_str(), hash], |row| row.get(0))?;
            if exists {
                found.push(hash.clone());
            }
        }
        Ok(found)
    }

    fn add_duplicate_key(&self, hash: &str, source: TransactionSource) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO fingerprints (source, hash) VALUES (?, ?)",
            params![source.as_str(), hash],
        )?;
        Ok(())
    }
}

impl Database {
    /// Total stored fingerprints
    pub fn fingerprint_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(count)
    }
}
