//! Service-boundary error type

use crate::sync::SyncPhase;

/// Errors surfaced to the caller of the trigger endpoint
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No mailbox account is linked for the user
    #[error("No Gmail account connected")]
    NoMailboxConnected,

    /// An account is linked but carries no access token; re-link required
    #[error("Gmail account has no access token; please reconnect")]
    NoAccessToken,

    /// The caller ignored `sync_in_progress` and triggered anyway
    #[error("A sync is already in progress")]
    SyncInProgress,

    /// Phase 1 failed before the trigger could be answered successfully
    #[error("{message}")]
    PhaseFailed { phase: SyncPhase, message: String },

    /// Storage failure outside any phase
    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// Stable machine-readable code for client handling
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::NoMailboxConnected => "NO_GMAIL_CONNECTED",
            SyncError::NoAccessToken => "NO_ACCESS_TOKEN",
            SyncError::SyncInProgress => "SYNC_IN_PROGRESS",
            SyncError::PhaseFailed { .. } => "SYNC_FAILED",
            SyncError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status an edge handler would answer with
    pub fn http_status(&self) -> u16 {
        match self {
            SyncError::NoMailboxConnected | SyncError::NoAccessToken => 400,
            SyncError::SyncInProgress => 409,
            SyncError::PhaseFailed { .. } | SyncError::Store(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(SyncError::NoMailboxConnected.code(), "NO_GMAIL_CONNECTED");
        assert_eq!(SyncError::NoAccessToken.code(), "NO_ACCESS_TOKEN");
        assert_eq!(SyncError::NoMailboxConnected.http_status(), 400);
        let failed = SyncError::PhaseFailed {
            phase: SyncPhase::Phase1,
            message: "Failed to scan the last 45 days".to_string(),
        };
        assert_eq!(failed.http_status(), 500);
        assert_eq!(failed.to_string(), "Failed to scan the last 45 days");
    }
}
