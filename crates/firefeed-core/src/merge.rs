//! Pairing of transfer legs
//!
//! Banks report one money movement as two records (debit and credit). The
//! merger folds such pairs into one survivor that carries both legs; the
//! partner moves into the survivor's `duplicate_transactions`. The survivor is
//! always the first-seen leg and keeps its position in the batch.
//!
//! Joining rules:
//! - paribas: same description and date, one debit and one credit row
//! - revolut: same id (savings deposit/withdrawal legs)
//! - privatbank: internal transfer legs with the same `HH:MM`, opposite
//!   directions, same card pair, and equal amounts unless the currencies differ

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{Transaction, TransactionSource, TransactionType};

/// Merge partner legs in a parsed batch
pub fn merge(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut merged: Vec<Transaction> = Vec::with_capacity(transactions.len());
    let mut pairs = 0;

    for tx in transactions {
        let partner = if tx.parsing_error.is_none() {
            merged.iter().position(|survivor| pairs_with(survivor, &tx))
        } else {
            None
        };

        match partner {
            Some(idx) => {
                absorb(&mut merged[idx], tx);
                pairs += 1;
            }
            None => merged.push(tx),
        }
    }

    if pairs > 0 {
        debug!(pairs, "Merged transfer legs");
    }
    merged
}

/// Exactly one side of the movement is populated
fn is_single_leg(tx: &Transaction) -> bool {
    tx.has_source_leg() != tx.has_destination_leg()
}

fn populated_leg(tx: &Transaction) -> (Decimal, &str) {
    if tx.has_source_leg() {
        (tx.source_amount, tx.source_currency.as_str())
    } else {
        (tx.destination_amount, tx.destination_currency.as_str())
    }
}

fn pairs_with(survivor: &Transaction, tx: &Transaction) -> bool {
    if survivor.parsing_error.is_some()
        || survivor.transaction_source != tx.transaction_source
        || !survivor.duplicate_transactions.is_empty()
        || !tx.duplicate_transactions.is_empty()
        || !is_single_leg(survivor)
        || !is_single_leg(tx)
        || survivor.has_source_leg() == tx.has_source_leg()
    {
        return false;
    }

    match tx.transaction_source {
        TransactionSource::Paribas => {
            survivor.description == tx.description && survivor.date == tx.date
        }
        TransactionSource::Revolut => {
            survivor.id == tx.id
                && survivor.kind == TransactionType::InternalTransfer
                && tx.kind == TransactionType::InternalTransfer
        }
        TransactionSource::Privatbank => {
            if survivor.kind != TransactionType::InternalTransfer
                || tx.kind != TransactionType::InternalTransfer
                || survivor.internal_transfer_direction_to == tx.internal_transfer_direction_to
                || survivor.date_from_message.is_empty()
                || survivor.date_from_message != tx.date_from_message
                || survivor.source_account != tx.source_account
                || survivor.destination_account != tx.destination_account
            {
                return false;
            }
            let (a_amount, a_currency) = populated_leg(survivor);
            let (b_amount, b_currency) = populated_leg(tx);
            a_currency != b_currency || a_amount == b_amount
        }
        TransactionSource::Mono | TransactionSource::Zen => false,
    }
}

/// Fill the survivor's missing leg from its partner and attach the partner
fn absorb(survivor: &mut Transaction, partner: Transaction) {
    if survivor.has_source_leg() {
        survivor.destination_amount = partner.destination_amount;
        survivor.destination_currency = partner.destination_currency.clone();
        if !partner.destination_account.is_empty() {
            survivor.destination_account = partner.destination_account.clone();
        }
        if survivor.source_account.is_empty() {
            survivor.source_account = partner.source_account.clone();
        }
    } else {
        survivor.source_amount = partner.source_amount;
        survivor.source_currency = partner.source_currency.clone();
        if !partner.source_account.is_empty() {
            survivor.source_account = partner.source_account.clone();
        }
        if survivor.destination_account.is_empty() {
            survivor.destination_account = partner.destination_account.clone();
        }
    }

    if survivor.description.is_empty() {
        survivor.description = partner.description.clone();
    }
    survivor.kind = TransactionType::InternalTransfer;
    survivor.duplicate_transactions.push(partner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;
    use chrono::{Duration, TimeZone, Utc};

    fn privat_leg(to: bool, amount: i64, currency: &str) -> Transaction {
        let mut tx = Transaction::new(
            TransactionSource::Privatbank,
            Utc.with_ymd_and_hms(2023, 5, 1, 16, 13, 5).unwrap(),
        );
        tx.kind = TransactionType::InternalTransfer;
        tx.internal_transfer_direction_to = to;
        tx.date_from_message = "16:13".into();
        tx.source_account = "4*68".into();
        tx.destination_account = "5*20".into();
        if to {
            tx.source_amount = Decimal::new(amount, 2);
            tx.source_currency = currency.into();
        } else {
            tx.destination_amount = Decimal::new(amount, 2);
            tx.destination_currency = currency.into();
        }
        tx.deduplication_key = format!("leg-{}", to);
        tx
    }

    #[test]
    fn test_privat_pair_merges() {
        let a = privat_leg(true, 100, "UAH");
        let mut b = privat_leg(false, 100, "UAH");
        b.date += Duration::seconds(4);
        let a_id = a.id.clone();

        let out = merge(vec![a, b]);
        assert_eq!(out.len(), 1);
        let tx = &out[0];
        assert_eq!(tx.id, a_id);
        assert_eq!(tx.kind, TransactionType::InternalTransfer);
        assert_eq!(tx.source_account, "4*68");
        assert_eq!(tx.destination_account, "5*20");
        assert_eq!(tx.source_amount, Decimal::new(100, 2));
        assert_eq!(tx.destination_amount, Decimal::new(100, 2));
        assert_eq!(tx.duplicate_transactions.len(), 1);
        assert_eq!(tx.deduplication_keys(), vec!["leg-true", "leg-false"]);
    }

    #[test]
    fn test_privat_multi_currency() {
        let out = merge(vec![
            privat_leg(true, 3800, "UAH"),
            privat_leg(false, 100, "USD"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_amount, Decimal::new(3800, 2));
        assert_eq!(out[0].source_currency, "UAH");
        assert_eq!(out[0].destination_amount, Decimal::new(100, 2));
        assert_eq!(out[0].destination_currency, "USD");
    }

    #[test]
    fn test_privat_same_currency_amount_mismatch() {
        let out = merge(vec![
            privat_leg(true, 100, "UAH"),
            privat_leg(false, 200, "UAH"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_privat_different_minute() {
        let a = privat_leg(true, 100, "UAH");
        let mut b = privat_leg(false, 100, "UAH");
        b.date_from_message = "16:14".into();
        assert_eq!(merge(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_credit_leg_first_survives() {
        let b = privat_leg(false, 100, "UAH");
        let b_id = b.id.clone();
        let out = merge(vec![b, privat_leg(true, 100, "UAH")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, b_id);
        assert!(out[0].has_source_leg());
        assert!(out[0].has_destination_leg());
    }

    fn paribas_row(debit: bool, account: &str) -> Transaction {
        let mut tx = Transaction::new(
            TransactionSource::Paribas,
            Utc.with_ymd_and_hms(2023, 5, 10, 0, 0, 0).unwrap(),
        );
        tx.description = "Oszczędności".into();
        if debit {
            tx.kind = TransactionType::RemoteTransfer;
            tx.source_amount = Decimal::new(1200, 0);
            tx.source_currency = "PLN".into();
            tx.source_account = account.into();
            tx.destination_account = "counterpart".into();
        } else {
            tx.kind = TransactionType::Income;
            tx.destination_amount = Decimal::new(1200, 0);
            tx.destination_currency = "PLN".into();
            tx.destination_account = account.into();
        }
        tx
    }

    #[test]
    fn test_paribas_self_transfer() {
        let out = merge(vec![paribas_row(true, "111"), paribas_row(false, "222")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, TransactionType::InternalTransfer);
        assert_eq!(out[0].source_account, "111");
        assert_eq!(out[0].destination_account, "222");
        assert_eq!(out[0].duplicate_transactions.len(), 1);
    }

    #[test]
    fn test_paribas_no_triple_merge() {
        let out = merge(vec![
            paribas_row(true, "111"),
            paribas_row(false, "222"),
            paribas_row(false, "333"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].duplicate_transactions.len(), 1);
        assert!(out[1].duplicate_transactions.is_empty());
    }

    #[test]
    fn test_paribas_two_debits_stay_apart() {
        let out = merge(vec![paribas_row(true, "111"), paribas_row(true, "111")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|tx| tx.duplicate_transactions.is_empty()));
    }

    #[test]
    fn test_revolut_savings_by_id() {
        let date = Utc::now();
        let mut out_leg = Transaction::new(TransactionSource::Revolut, date);
        out_leg.id = "sv-1".into();
        out_leg.kind = TransactionType::InternalTransfer;
        out_leg.source_amount = Decimal::new(50, 0);
        out_leg.source_currency = "EUR".into();
        out_leg.source_account = "acc".into();
        let mut in_leg = Transaction::new(TransactionSource::Revolut, date);
        in_leg.id = "sv-1".into();
        in_leg.kind = TransactionType::InternalTransfer;
        in_leg.destination_amount = Decimal::new(50, 0);
        in_leg.destination_currency = "EUR".into();
        in_leg.destination_account = "pocket".into();

        let out = merge(vec![out_leg, in_leg]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_account, "acc");
        assert_eq!(out[0].destination_account, "pocket");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![
            privat_leg(true, 100, "UAH"),
            privat_leg(false, 100, "UAH"),
            privat_leg(true, 500, "UAH"),
        ];
        let once = merge(batch);
        let twice = merge(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_errored_legs_are_left_alone() {
        let mut b = privat_leg(false, 100, "UAH");
        b.parsing_error = Some(RecordError::parse("bad"));
        assert_eq!(merge(vec![privat_leg(true, 100, "UAH"), b]).len(), 2);
    }
}
