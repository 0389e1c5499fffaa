//! Linked mailbox account model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mailbox account linked by a user
///
/// Holds the OAuth credential the pipeline reads mail with. The access token
/// may be missing if the link flow never completed; triggering a sync in that
/// state is rejected with a re-link error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAccount {
    /// Owning user
    pub user_id: String,
    /// Mailbox provider name (currently always "gmail")
    pub provider: String,
    /// The linked mailbox address
    pub address: String,
    /// Current OAuth access token
    pub access_token: Option<String>,
    /// Refresh token, if the provider granted offline access
    pub refresh_token: Option<String>,
    /// When the account was linked
    pub connected_at: DateTime<Utc>,
}

impl MailAccount {
    /// Create a newly linked Gmail account
    pub fn gmail(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            provider: "gmail".to_string(),
            address: address.into(),
            access_token: None,
            refresh_token: None,
            connected_at: Utc::now(),
        }
    }

    /// Attach tokens to the account
    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        self.access_token = Some(access_token.into());
        self.refresh_token = refresh_token;
        self
    }
}
