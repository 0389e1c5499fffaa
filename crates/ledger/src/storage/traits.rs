//! Storage trait definition

use anyhow::Result;

use crate::models::{MailAccount, SyncStatus, Transaction};

/// Persistence boundary for the ingestion pipeline
///
/// Transactions are append-only and deduplicated on `(user_id, email_id)`;
/// the sync status is a singleton row per user, continuously overwritten.
pub trait LedgerStore: Send + Sync {
    /// Insert or replace a linked mailbox account
    fn upsert_account(&self, account: MailAccount) -> Result<()>;

    /// Get the linked account for a user
    fn get_account(&self, user_id: &str) -> Result<Option<MailAccount>>;

    /// Persist a refreshed access token for a user's account
    fn update_access_token(&self, user_id: &str, access_token: &str) -> Result<()>;

    /// Insert a transaction unless one already exists for its message
    ///
    /// Returns `true` when a row was written, `false` when the
    /// `(user_id, email_id)` key was already present.
    fn insert_transaction(&self, txn: &Transaction) -> Result<bool>;

    /// Check whether a message has already produced a transaction
    fn has_transaction(&self, user_id: &str, email_id: &str) -> Result<bool>;

    /// List transactions for a user, newest first
    fn list_transactions(&self, user_id: &str, limit: usize, offset: usize)
    -> Result<Vec<Transaction>>;

    /// Count transactions for a user
    fn count_transactions(&self, user_id: &str) -> Result<usize>;

    /// Get the current sync status for a user
    fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>>;

    /// Overwrite the sync status for a user (upsert)
    fn save_sync_status(&self, status: &SyncStatus) -> Result<()>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<()>;
}
