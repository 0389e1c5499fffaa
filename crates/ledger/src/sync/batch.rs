//! Concurrent per-batch message processing
//!
//! Messages within a batch are dispatched concurrently; the batch completes
//! as a whole before counters advance. Every per-message failure (fetch,
//! decode, classify, persist) downgrades to a skip so one bad message can
//! never stop a phase.

use chrono::Utc;
use log::{debug, warn};
use rayon::prelude::*;

use crate::classify::{Extraction, Extractor, TransactionCandidate};
use crate::gmail::{Mailbox, RawEmail};
use crate::models::{Transaction, sanitize_text};
use crate::storage::LedgerStore;

/// Counter deltas from one completed batch
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOutcome {
    /// Messages accounted for, including skips and non-transactions
    pub processed: u64,
    /// Transactions newly persisted
    pub found: u64,
}

enum MessageOutcome {
    Persisted,
    Duplicate,
    NotATransaction,
    Skipped,
}

/// Process one batch of message ids concurrently
pub fn process_batch(
    user_id: &str,
    ids: &[String],
    mailbox: &dyn Mailbox,
    extractor: &dyn Extractor,
    store: &dyn LedgerStore,
) -> BatchOutcome {
    let found = ids
        .par_iter()
        .map(|id| process_message(user_id, id, mailbox, extractor, store))
        .filter(|outcome| matches!(outcome, MessageOutcome::Persisted))
        .count();

    BatchOutcome {
        processed: ids.len() as u64,
        found: found as u64,
    }
}

fn process_message(
    user_id: &str,
    id: &str,
    mailbox: &dyn Mailbox,
    extractor: &dyn Extractor,
    store: &dyn LedgerStore,
) -> MessageOutcome {
    let email = match mailbox.fetch(id) {
        Ok(email) => email,
        Err(e) => {
            warn!("Skipping message {}: fetch failed: {:#}", id, e);
            return MessageOutcome::Skipped;
        }
    };

    // No decodable text means nothing to classify
    if email.text.is_empty() {
        debug!("Message {} has no text; not a transaction", id);
        return MessageOutcome::NotATransaction;
    }

    match extractor.classify(&email.subject, &email.text) {
        Ok(Extraction::NotATransaction) => MessageOutcome::NotATransaction,
        Ok(Extraction::Transaction(candidate)) => persist(user_id, &email, candidate, store),
        Err(e) => {
            warn!("Skipping message {}: classification failed: {:#}", id, e);
            MessageOutcome::Skipped
        }
    }
}

/// Persist immediately on successful extraction; not deferred to batch end
fn persist(
    user_id: &str,
    email: &RawEmail,
    candidate: TransactionCandidate,
    store: &dyn LedgerStore,
) -> MessageOutcome {
    let txn = bind_candidate(user_id, email, candidate);
    match store.insert_transaction(&txn) {
        Ok(true) => MessageOutcome::Persisted,
        Ok(false) => {
            debug!("Message {} already ingested; skipping duplicate", email.id);
            MessageOutcome::Duplicate
        }
        Err(e) => {
            warn!("Skipping message {}: persist failed: {:#}", email.id, e);
            MessageOutcome::Skipped
        }
    }
}

/// Bind an extraction candidate to its user and source message
fn bind_candidate(user_id: &str, email: &RawEmail, candidate: TransactionCandidate) -> Transaction {
    Transaction {
        user_id: user_id.to_string(),
        email_id: email.id.clone(),
        amount: candidate.amount,
        // Unparsable source dates fall back to ingestion time
        date: candidate.date.unwrap_or_else(Utc::now),
        txn_type: candidate.txn_type,
        category: candidate.category,
        merchant: candidate.merchant,
        description: candidate.description,
        payment_method: candidate.payment_method,
        confidence: candidate.confidence,
        raw_subject: sanitize_text(&email.subject, Transaction::RAW_SUBJECT_MAX),
        raw_body: sanitize_text(&email.text, Transaction::RAW_BODY_MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, TxnType};
    use crate::storage::InMemoryLedgerStore;
    use anyhow::{Result, anyhow};
    use std::collections::HashSet;

    /// Mailbox whose fetches fail for a chosen set of ids
    struct FlakyMailbox {
        failing: HashSet<String>,
    }

    impl Mailbox for FlakyMailbox {
        fn search(&self, _query: &str, _cap: usize) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch(&self, id: &str) -> Result<RawEmail> {
            if self.failing.contains(id) {
                return Err(anyhow!("HTTP 500"));
            }
            Ok(RawEmail {
                id: id.to_string(),
                subject: format!("Alert {}", id),
                text: format!("Rs.100 debited ref {}", id),
            })
        }
    }

    /// Extractor that recognizes every email as the same kind of debit
    struct FixedExtractor;

    impl Extractor for FixedExtractor {
        fn classify(&self, _subject: &str, body: &str) -> Result<Extraction> {
            if body.is_empty() {
                return Ok(Extraction::NotATransaction);
            }
            Ok(Extraction::Transaction(TransactionCandidate {
                amount: 100.0,
                date: None,
                merchant: "Merchant".to_string(),
                description: "debit".to_string(),
                txn_type: TxnType::Debit,
                category: Category::Other,
                payment_method: "UPI".to_string(),
                confidence: 0.8,
            }))
        }
    }

    /// Extractor that always errors
    struct BrokenExtractor;

    impl Extractor for BrokenExtractor {
        fn classify(&self, _subject: &str, _body: &str) -> Result<Extraction> {
            Err(anyhow!("model returned garbage"))
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    #[test]
    fn test_batch_counts() {
        let store = InMemoryLedgerStore::new();
        let mailbox = FlakyMailbox {
            failing: HashSet::new(),
        };
        let outcome = process_batch("u1", &ids(5), &mailbox, &FixedExtractor, &store);
        assert_eq!(outcome.processed, 5);
        assert_eq!(outcome.found, 5);
        assert_eq!(store.count_transactions("u1").unwrap(), 5);
    }

    #[test]
    fn test_fetch_failure_mid_batch_does_not_abort() {
        let store = InMemoryLedgerStore::new();
        let mailbox = FlakyMailbox {
            failing: HashSet::from(["m2".to_string()]),
        };
        let outcome = process_batch("u1", &ids(5), &mailbox, &FixedExtractor, &store);
        // The failed message still counts as processed, just yields nothing
        assert_eq!(outcome.processed, 5);
        assert_eq!(outcome.found, 4);
        assert!(!store.has_transaction("u1", "m2").unwrap());
    }

    #[test]
    fn test_classifier_failure_is_a_skip() {
        let store = InMemoryLedgerStore::new();
        let mailbox = FlakyMailbox {
            failing: HashSet::new(),
        };
        let outcome = process_batch("u1", &ids(3), &mailbox, &BrokenExtractor, &store);
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.found, 0);
    }

    #[test]
    fn test_reprocessing_does_not_duplicate() {
        let store = InMemoryLedgerStore::new();
        let mailbox = FlakyMailbox {
            failing: HashSet::new(),
        };
        let batch = ids(4);
        process_batch("u1", &batch, &mailbox, &FixedExtractor, &store);
        let outcome = process_batch("u1", &batch, &mailbox, &FixedExtractor, &store);
        assert_eq!(outcome.processed, 4);
        assert_eq!(outcome.found, 0);
        assert_eq!(store.count_transactions("u1").unwrap(), 4);
    }

    #[test]
    fn test_empty_text_is_not_a_transaction() {
        struct EmptyMailbox;
        impl Mailbox for EmptyMailbox {
            fn search(&self, _query: &str, _cap: usize) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            fn fetch(&self, id: &str) -> Result<RawEmail> {
                Ok(RawEmail {
                    id: id.to_string(),
                    subject: "Promo".to_string(),
                    text: String::new(),
                })
            }
        }

        // The extractor would persist anything it sees; it must not be called
        struct PanickyExtractor;
        impl Extractor for PanickyExtractor {
            fn classify(&self, _subject: &str, _body: &str) -> Result<Extraction> {
                panic!("classifier called for empty text");
            }
        }

        let store = InMemoryLedgerStore::new();
        let outcome = process_batch("u1", &ids(2), &EmptyMailbox, &PanickyExtractor, &store);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.found, 0);
    }

    #[test]
    fn test_raw_body_truncated() {
        struct LongMailbox;
        impl Mailbox for LongMailbox {
            fn search(&self, _query: &str, _cap: usize) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            fn fetch(&self, id: &str) -> Result<RawEmail> {
                Ok(RawEmail {
                    id: id.to_string(),
                    subject: "Alert".to_string(),
                    text: "x".repeat(5000),
                })
            }
        }

        let store = InMemoryLedgerStore::new();
        process_batch(
            "u1",
            &["m0".to_string()],
            &LongMailbox,
            &FixedExtractor,
            &store,
        );
        let txns = store.list_transactions("u1", 1, 0).unwrap();
        assert!(txns[0].raw_body.chars().count() <= Transaction::RAW_BODY_MAX);
    }
}
