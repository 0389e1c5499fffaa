//! Service facade for the ingestion pipeline
//!
//! The primary entry point for callers: trigger a sync, read or subscribe to
//! its status, and list what it wrote. Wraps the precondition checks around
//! the engine the way the trigger endpoint contract requires.

use std::sync::{Arc, mpsc};

use log::warn;

use crate::classify::Extractor;
use crate::config::{GoogleCredentials, SyncSettings};
use crate::error::SyncError;
use crate::gmail::{GmailClient, Mailbox, TokenManager};
use crate::models::{MailAccount, SyncStatus, Transaction};
use crate::storage::LedgerStore;
use crate::sync::{StatusFeed, SyncEngine};

/// Successful trigger response
#[derive(Debug, Clone, serde::Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub phase_1_complete: bool,
    pub message: String,
}

/// High-level sync service
pub struct SyncService {
    store: Arc<dyn LedgerStore>,
    extractor: Arc<dyn Extractor>,
    /// Absent credentials disable token refresh but never block a sync
    credentials: Option<GoogleCredentials>,
    settings: Arc<SyncSettings>,
    feed: Arc<StatusFeed>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        extractor: Arc<dyn Extractor>,
        credentials: Option<GoogleCredentials>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            credentials,
            settings: Arc::new(settings),
            feed: Arc::new(StatusFeed::new()),
        }
    }

    /// Link (or re-link) a mailbox account
    pub fn connect_account(&self, account: MailAccount) -> Result<(), SyncError> {
        self.store.upsert_account(account)?;
        Ok(())
    }

    /// Trigger a sync for a user
    ///
    /// Blocks until phase 1 has fully processed; phases 2-4 continue after
    /// this returns. Error responses best-effort record the failure in the
    /// status row so the client sees it without re-polling the endpoint.
    pub fn trigger_sync(&self, user_id: &str) -> Result<TriggerResponse, SyncError> {
        let result = self.try_trigger(user_id);
        if let Err(err) = &result {
            self.record_trigger_failure(user_id, err);
        }
        result
    }

    fn try_trigger(&self, user_id: &str) -> Result<TriggerResponse, SyncError> {
        let account = self
            .store
            .get_account(user_id)?
            .ok_or(SyncError::NoMailboxConnected)?;

        if account.access_token.is_none() {
            return Err(SyncError::NoAccessToken);
        }

        let status = self.store.get_sync_status(user_id)?;
        if status.as_ref().is_some_and(|s| s.sync_in_progress) {
            return Err(SyncError::SyncInProgress);
        }
        let last_sync_at = status.and_then(|s| s.last_sync_at);

        let manager = TokenManager::new(self.credentials.clone(), self.settings.token_staleness());
        let token = manager
            .ensure_fresh(&account, last_sync_at, self.store.as_ref())
            .ok_or(SyncError::NoAccessToken)?;

        let mailbox: Arc<dyn Mailbox> = Arc::new(GmailClient::new(token));
        let engine = SyncEngine::new(
            mailbox,
            self.extractor.clone(),
            self.store.clone(),
            self.settings.clone(),
            self.feed.clone(),
        );

        let outcome = engine.run(user_id)?;
        // Fire-and-forget: the continuation outlives this call and any
        // caller that abandons it
        drop(outcome.background);

        Ok(TriggerResponse {
            success: true,
            phase_1_complete: true,
            message: outcome.message,
        })
    }

    /// Best-effort error visibility for precondition failures
    ///
    /// Phase failures are already recorded by the engine, and an in-progress
    /// rejection must not clobber the live run's record.
    fn record_trigger_failure(&self, user_id: &str, err: &SyncError) {
        if matches!(
            err,
            SyncError::SyncInProgress | SyncError::PhaseFailed { .. }
        ) {
            return;
        }

        let mut status = match self.store.get_sync_status(user_id) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let mut fresh = SyncStatus::started(user_id, None);
                fresh.sync_in_progress = false;
                fresh
            }
            Err(e) => {
                warn!("Could not load status to record trigger failure: {:#}", e);
                return;
            }
        };
        status.mark_failed(err.to_string());
        if let Err(e) = self.store.save_sync_status(&status) {
            warn!("Could not record trigger failure: {:#}", e);
        }
    }

    /// Current status record for a user (polling fallback)
    pub fn sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>, SyncError> {
        Ok(self.store.get_sync_status(user_id)?)
    }

    /// Push-style status updates for progress UIs
    pub fn subscribe(&self) -> mpsc::Receiver<SyncStatus> {
        self.feed.subscribe()
    }

    /// Transactions the pipeline has written, newest first
    pub fn transactions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>, SyncError> {
        Ok(self.store.list_transactions(user_id, limit, offset)?)
    }
}
