//! Ledger crate - mail ingestion and transaction classification
//!
//! This crate provides the personal-finance pipeline that turns a Gmail
//! mailbox into structured transactions:
//! - Domain models (Transaction, SyncStatus, MailAccount)
//! - Gmail API client, token refresh, query building, payload decoding
//! - A pluggable classification boundary with an HTTP-backed extractor
//! - Storage trait abstractions (SQLite and in-memory)
//! - The four-phase sync engine with live progress reporting
//!
//! This crate has zero UI dependencies; screens, onboarding, and spending
//! aggregation live with their own services and only consume what the
//! pipeline persists.

pub mod classify;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod service;
pub mod storage;
pub mod sync;

pub use classify::{Extraction, Extractor, HttpExtractor, TransactionCandidate};
pub use config::{ClassifierConfig, GoogleCredentials, SyncSettings};
pub use error::SyncError;
pub use gmail::{GmailClient, Mailbox, ProviderError, RawEmail, TokenManager};
pub use models::{Category, MailAccount, SyncStage, SyncStatus, Transaction, TxnType};
pub use service::{SyncService, TriggerResponse};
pub use storage::{InMemoryLedgerStore, LedgerStore, SqliteLedgerStore};
pub use sync::{
    BACKGROUND_FAILURE_MESSAGE, PhaseWindow, StatusFeed, SyncEngine, SyncOutcome, SyncPhase,
};
