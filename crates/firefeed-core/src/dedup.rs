//! Fingerprint-based duplicate detection
//!
//! A fingerprint is the hex SHA-512 of a transaction's deduplication key,
//! stored per source tag. Empty keys are never fingerprinted.

use std::collections::HashSet;

use sha2::{Digest, Sha512};
use tracing::debug;

use crate::error::Result;
use crate::models::{Transaction, TransactionSource};
use crate::store::FingerprintStore;

/// Hex-encoded SHA-512 of a deduplication key
pub fn fingerprint(key: &str) -> String {
    hex::encode(Sha512::digest(key.as_bytes()))
}

pub struct Deduplicator<'a> {
    store: &'a dyn FingerprintStore,
}

impl<'a> Deduplicator<'a> {
    pub fn new(store: &'a dyn FingerprintStore) -> Self {
        Self { store }
    }

    /// Ids of transactions whose key (or any companion key) is already stored
    pub fn find_duplicates(
        &self,
        source: TransactionSource,
        transactions: &[Transaction],
    ) -> Result<HashSet<String>> {
        let hashes: Vec<String> = transactions
            .iter()
            .flat_map(|tx| tx.deduplication_keys())
            .map(fingerprint)
            .collect();
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }

        let known: HashSet<String> = self
            .store
            .get_duplicates(&hashes, source)?
            .into_iter()
            .collect();

        let duplicates: HashSet<String> = transactions
            .iter()
            .filter(|tx| {
                tx.deduplication_keys()
                    .into_iter()
                    .any(|key| known.contains(&fingerprint(key)))
            })
            .map(|tx| tx.id.clone())
            .collect();

        debug!(
            source = %source,
            checked = transactions.len(),
            duplicates = duplicates.len(),
            "Checked fingerprints"
        );
        Ok(duplicates)
    }

    /// Persist the fingerprints of a committed transaction and its companions
    pub fn remember(&self, source: TransactionSource, transaction: &Transaction) -> Result<()> {
        for key in transaction.deduplication_keys() {
            self.store.add_duplicate_key(&fingerprint(key), source)?;
        }
        Ok(())
    }
}
