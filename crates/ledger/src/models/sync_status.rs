//! Per-user sync progress record
//!
//! One live record per user, continuously overwritten while a sync runs.
//! The client renders its progress bar from this record, either by polling
//! or through the push feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::SyncPhase;

/// Which stage of the sync the record currently describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStage {
    #[serde(rename = "phase_1")]
    Phase1,
    #[serde(rename = "phase_2")]
    Phase2,
    #[serde(rename = "phase_3")]
    Phase3,
    #[serde(rename = "phase_4")]
    Phase4,
    #[serde(rename = "complete")]
    Complete,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Phase1 => "phase_1",
            SyncStage::Phase2 => "phase_2",
            SyncStage::Phase3 => "phase_3",
            SyncStage::Phase4 => "phase_4",
            SyncStage::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phase_1" => Some(SyncStage::Phase1),
            "phase_2" => Some(SyncStage::Phase2),
            "phase_3" => Some(SyncStage::Phase3),
            "phase_4" => Some(SyncStage::Phase4),
            "complete" => Some(SyncStage::Complete),
            _ => None,
        }
    }
}

impl From<SyncPhase> for SyncStage {
    fn from(phase: SyncPhase) -> Self {
        match phase {
            SyncPhase::Phase1 => SyncStage::Phase1,
            SyncPhase::Phase2 => SyncStage::Phase2,
            SyncPhase::Phase3 => SyncStage::Phase3,
            SyncPhase::Phase4 => SyncStage::Phase4,
        }
    }
}

/// The single mutable sync-status record for a user
///
/// Counters accumulate across all four phases of a run and never decrease;
/// a fresh sync resets everything back to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub user_id: String,
    /// True from the moment any phase starts until all phases finish or fail
    pub sync_in_progress: bool,
    pub sync_phase: SyncStage,
    /// 0-100, non-decreasing within a run
    pub progress_percentage: u8,
    pub total_emails_found: u64,
    pub emails_processed: u64,
    pub transactions_found: u64,
    pub phase_1_complete: bool,
    pub phase_2_complete: bool,
    pub phase_3_complete: bool,
    pub phase_4_complete: bool,
    /// Advisory; recomputed at each phase start from the phase's message count
    pub estimated_completion_time: Option<DateTime<Utc>>,
    /// Set on fatal failure; implies `sync_in_progress == false`
    pub error_message: Option<String>,
    /// Human-readable phase/progress string for display
    pub current_status: String,
    /// Stamped when a run completes; feeds the token staleness check
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Fresh record for a newly triggered sync
    ///
    /// All counters and phase flags reset; `last_sync_at` carries over from
    /// the previous run so token staleness stays observable mid-run.
    pub fn started(user_id: impl Into<String>, last_sync_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id: user_id.into(),
            sync_in_progress: true,
            sync_phase: SyncStage::Phase1,
            progress_percentage: 0,
            total_emails_found: 0,
            emails_processed: 0,
            transactions_found: 0,
            phase_1_complete: false,
            phase_2_complete: false,
            phase_3_complete: false,
            phase_4_complete: false,
            estimated_completion_time: None,
            error_message: None,
            current_status: "Starting sync".to_string(),
            last_sync_at,
        }
    }

    pub fn mark_phase_complete(&mut self, phase: SyncPhase) {
        match phase {
            SyncPhase::Phase1 => self.phase_1_complete = true,
            SyncPhase::Phase2 => self.phase_2_complete = true,
            SyncPhase::Phase3 => self.phase_3_complete = true,
            SyncPhase::Phase4 => self.phase_4_complete = true,
        }
    }

    pub fn is_phase_complete(&self, phase: SyncPhase) -> bool {
        match phase {
            SyncPhase::Phase1 => self.phase_1_complete,
            SyncPhase::Phase2 => self.phase_2_complete,
            SyncPhase::Phase3 => self.phase_3_complete,
            SyncPhase::Phase4 => self.phase_4_complete,
        }
    }

    /// Recompute the percentage from the accumulated counters
    ///
    /// `floor(min(processed/total, 1) * 100)`, then held at its high-water
    /// mark so the bar never moves backwards when a later phase grows
    /// `total_emails_found`.
    pub fn recompute_progress(&mut self) {
        if self.total_emails_found == 0 {
            return;
        }
        let ratio = (self.emails_processed as f64 / self.total_emails_found as f64).min(1.0);
        let computed = (ratio * 100.0).floor() as u8;
        self.progress_percentage = self.progress_percentage.max(computed).min(100);
    }

    /// Terminal success: all phases done
    pub fn mark_complete(&mut self) {
        self.sync_in_progress = false;
        self.sync_phase = SyncStage::Complete;
        self.progress_percentage = 100;
        self.estimated_completion_time = None;
        self.current_status = "Sync complete".to_string();
        self.last_sync_at = Some(Utc::now());
    }

    /// Terminal failure: record the error, completed phases stay marked
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.sync_in_progress = false;
        self.estimated_completion_time = None;
        self.current_status = message.clone();
        self.error_message = Some(message);
    }
}
