//! Transaction classification boundary
//!
//! The model behind classification is external; this module owns the
//! contract around the call: the pluggable [`Extractor`] trait, the
//! candidate shape it must produce, and the validation and JSON-recovery
//! defenses applied to whatever comes back.

mod http;
mod parsing;

pub use http::HttpExtractor;
pub use parsing::parse_extraction;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Category, TxnType};

/// Recommended (not enforced) payment-method vocabulary
pub const PAYMENT_METHODS: &[&str] = &[
    "UPI-P2A",
    "UPI-P2M",
    "UPI",
    "Credit Card",
    "Debit Card",
    "NEFT",
    "IMPS",
    "RTGS",
    "Other",
];

/// A recognized transaction before it is bound to a user and message
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCandidate {
    /// Positive amount
    pub amount: f64,
    /// Parsed transaction date; `None` when the source text had no usable one
    pub date: Option<DateTime<Utc>>,
    pub merchant: String,
    pub description: String,
    pub txn_type: TxnType,
    pub category: Category,
    pub payment_method: String,
    /// Clamped to [0, 1]
    pub confidence: f64,
}

/// Outcome of classifying one email
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Transaction(TransactionCandidate),
    NotATransaction,
}

/// Classification capability
///
/// Implementations must honor the category precedence the prompt contract
/// spells out: transfer markers (P2A/P2M) first, then
/// investment platforms, credit-card-bill markers, loan EMI keywords,
/// salary keywords, merchant lookup, and finally a generic merchant
/// payment. An error return is treated by the pipeline as a per-message
/// skip, never a phase failure.
pub trait Extractor: Send + Sync {
    fn classify(&self, subject: &str, body: &str) -> Result<Extraction>;
}
