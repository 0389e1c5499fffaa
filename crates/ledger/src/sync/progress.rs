//! Serialized progress reporting
//!
//! All status mutations for a run funnel through one [`ProgressReporter`],
//! which owns the live record, persists every change, and pushes a snapshot
//! to subscribers. The engine holds the only reporter for a run, so writes
//! to the per-user row are serialized by construction.

use anyhow::Result;
use chrono::Utc;
use log::warn;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use super::batch::BatchOutcome;
use super::phases::SyncPhase;
use crate::models::SyncStatus;
use crate::storage::LedgerStore;

/// Push feed of status snapshots
///
/// Subscribers get every update in order; polling the store keeps working as
/// the fallback. Disconnected receivers are pruned on the next publish.
#[derive(Default)]
pub struct StatusFeed {
    subscribers: Mutex<Vec<mpsc::Sender<SyncStatus>>>,
}

impl StatusFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<SyncStatus> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub(crate) fn publish(&self, status: &SyncStatus) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(status.clone()).is_ok());
    }
}

/// The single writer for a run's status record
pub struct ProgressReporter {
    store: Arc<dyn LedgerStore>,
    feed: Arc<StatusFeed>,
    status: Mutex<SyncStatus>,
    per_message_cost: Duration,
}

impl ProgressReporter {
    /// Reset the record for a fresh run and persist the starting state
    ///
    /// `last_sync_at` from the previous run carries over so token staleness
    /// stays observable while this run is in flight.
    pub fn begin(
        store: Arc<dyn LedgerStore>,
        feed: Arc<StatusFeed>,
        user_id: &str,
        per_message_cost: Duration,
    ) -> Result<Self> {
        let last_sync_at = store
            .get_sync_status(user_id)?
            .and_then(|s| s.last_sync_at);
        let status = SyncStatus::started(user_id, last_sync_at);
        store.save_sync_status(&status)?;
        feed.publish(&status);

        Ok(Self {
            store,
            feed,
            status: Mutex::new(status),
            per_message_cost,
        })
    }

    fn commit(&self, mutate: impl FnOnce(&mut SyncStatus)) -> Result<()> {
        let snapshot = {
            let mut status = self.status.lock().unwrap();
            mutate(&mut status);
            status.clone()
        };
        self.store.save_sync_status(&snapshot)?;
        self.feed.publish(&snapshot);
        Ok(())
    }

    /// New phase label and status text, written before any fetch begins
    pub fn phase_started(&self, phase: SyncPhase) -> Result<()> {
        self.commit(|status| {
            status.sync_phase = phase.into();
            status.current_status = format!("Scanning {}", phase.descriptor());
        })
    }

    /// Record the phase's message count and recompute the completion estimate
    pub fn phase_found(&self, count: usize) -> Result<()> {
        let estimate = Utc::now()
            + chrono::Duration::milliseconds(
                (self.per_message_cost.as_millis() as i64).saturating_mul(count as i64),
            );
        self.commit(|status| {
            status.total_emails_found += count as u64;
            status.estimated_completion_time = Some(estimate);
            status.current_status = format!(
                "Processing {} of {} emails",
                status.emails_processed, status.total_emails_found
            );
        })
    }

    /// Advance the counters once per completed batch
    pub fn batch_finished(&self, outcome: &BatchOutcome) -> Result<()> {
        self.commit(|status| {
            status.emails_processed += outcome.processed;
            status.transactions_found += outcome.found;
            status.recompute_progress();
            status.current_status = format!(
                "Processing {} of {} emails",
                status.emails_processed, status.total_emails_found
            );
        })
    }

    pub fn phase_completed(&self, phase: SyncPhase) -> Result<()> {
        self.commit(|status| {
            status.mark_phase_complete(phase);
            status.current_status = format!("Finished scanning {}", phase.descriptor());
        })
    }

    /// Terminal success
    pub fn finished(&self) -> Result<()> {
        self.commit(|status| status.mark_complete())
    }

    /// Terminal failure; best-effort since it runs on error paths
    pub fn failed(&self, message: &str) {
        if let Err(e) = self.commit(|status| status.mark_failed(message)) {
            warn!("Failed to record sync error state: {:#}", e);
        }
    }
}
