//! Sync state machine
//!
//! States: idle -> phase_1 -> phase_2 -> phase_3 -> phase_4 -> complete,
//! with a terminal error state reachable from any running state. Phase 1
//! blocks the trigger; phases 2-4 run on a detached thread that outlives the
//! triggering request. Phases never overlap: each one's completion write
//! lands before the next phase starts.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::batch::process_batch;
use super::phases::SyncPhase;
use super::progress::{ProgressReporter, StatusFeed};
use crate::classify::Extractor;
use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::gmail::{Mailbox, ProviderError, build_query};
use crate::storage::LedgerStore;

/// Error text recorded when a background phase fails for a non-provider
/// reason; the phase-1 data the user already has stays valid.
pub const BACKGROUND_FAILURE_MESSAGE: &str =
    "Background sync failed; recent transactions are still available";

/// Result of a successfully triggered sync
#[derive(Debug)]
pub struct SyncOutcome {
    /// Client-facing message for the trigger response
    pub message: String,
    /// Handle to the phases 2-4 continuation; `None` when the thread could
    /// not be spawned (the continuation is then dropped)
    pub background: Option<JoinHandle<()>>,
}

/// Drives the four-phase sync for one user at a time
#[derive(Clone)]
pub struct SyncEngine {
    mailbox: Arc<dyn Mailbox>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn LedgerStore>,
    settings: Arc<SyncSettings>,
    feed: Arc<StatusFeed>,
}

impl SyncEngine {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn LedgerStore>,
        settings: Arc<SyncSettings>,
        feed: Arc<StatusFeed>,
    ) -> Self {
        Self {
            mailbox,
            extractor,
            store,
            settings,
            feed,
        }
    }

    /// Run a sync: phase 1 synchronously, phases 2-4 in the background
    ///
    /// Returns once phase 1 has fully processed and its completion flag is
    /// persisted. A phase-1 failure is returned to the caller; background
    /// failures are only recorded in the status row.
    pub fn run(&self, user_id: &str) -> Result<SyncOutcome, SyncError> {
        let reporter = Arc::new(ProgressReporter::begin(
            self.store.clone(),
            self.feed.clone(),
            user_id,
            self.settings.per_message_cost(),
        )?);

        if let Err(err) = self.run_phase(SyncPhase::Phase1, user_id, &reporter) {
            let message = format!(
                "Failed to scan {}: {:#}",
                SyncPhase::Phase1.descriptor(),
                err
            );
            reporter.failed(&message);
            return Err(SyncError::PhaseFailed {
                phase: SyncPhase::Phase1,
                message,
            });
        }

        let engine = self.clone();
        let background_reporter = reporter.clone();
        let user = user_id.to_string();

        let background = std::thread::Builder::new()
            .name("ledger-sync".to_string())
            .spawn(move || engine.run_background(&user, &background_reporter))
            .ok();

        if background.is_none() {
            warn!("Could not start background continuation; phases 2-4 skipped");
        }

        Ok(SyncOutcome {
            message: "Recent transactions synced; older history continues in the background"
                .to_string(),
            background,
        })
    }

    /// Phases 2-4, strictly sequential, then the terminal complete state
    fn run_background(&self, user_id: &str, reporter: &ProgressReporter) {
        for phase in SyncPhase::background() {
            if let Err(err) = self.run_phase(phase, user_id, reporter) {
                warn!("Background sync failed during {}: {:#}", phase, err);
                reporter.failed(&background_failure_message(phase, &err));
                return;
            }
        }

        if let Err(err) = reporter.finished() {
            warn!("Failed to record sync completion: {:#}", err);
        }
    }

    /// One phase: label, search, batched processing, completion flag
    fn run_phase(
        &self,
        phase: SyncPhase,
        user_id: &str,
        reporter: &ProgressReporter,
    ) -> Result<()> {
        // Observers must never see a stale phase label while work runs
        reporter.phase_started(phase)?;

        let window = phase.window(Utc::now());
        let query = build_query(&self.settings, &window);

        let ids = self
            .mailbox
            .search(&query, self.settings.page_cap)
            .with_context(|| format!("Mailbox search failed for {}", phase))?;

        info!(
            "{}: {} messages matched for user {}",
            phase,
            ids.len(),
            user_id
        );
        reporter.phase_found(ids.len())?;

        for chunk in ids.chunks(self.settings.batch_size.max(1)) {
            let outcome = process_batch(
                user_id,
                chunk,
                self.mailbox.as_ref(),
                self.extractor.as_ref(),
                self.store.as_ref(),
            );
            reporter.batch_finished(&outcome)?;
        }

        reporter.phase_completed(phase)?;
        info!("{} complete for user {}", phase, user_id);
        Ok(())
    }
}

/// Provider failures get a phase-specific message; anything else gets the
/// generic background-failure text.
fn background_failure_message(phase: SyncPhase, err: &anyhow::Error) -> String {
    if err.root_cause().downcast_ref::<ProviderError>().is_some() {
        format!(
            "Mailbox provider error while scanning {}",
            phase.descriptor()
        )
    } else {
        BACKGROUND_FAILURE_MESSAGE.to_string()
    }
}
