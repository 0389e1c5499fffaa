//! Access-token freshness for the mailbox API
//!
//! Before a sync run, the access token is refreshed if the last successful
//! sync is older than the staleness threshold and a refresh token is on file.
//! A refreshed token is persisted immediately so a crash mid-sync does not
//! lose it. Refresh failure is never fatal: the existing token is used and
//! downstream calls fail naturally if it has truly expired.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use std::time::Instant;

use crate::config::GoogleCredentials;
use crate::models::MailAccount;
use crate::storage::LedgerStore;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Decides whether to reuse or refresh the stored access token
pub struct TokenManager {
    credentials: Option<GoogleCredentials>,
    staleness: chrono::Duration,
    token_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl TokenManager {
    /// `credentials` may be absent; refresh is then skipped with a warning
    pub fn new(credentials: Option<GoogleCredentials>, staleness: chrono::Duration) -> Self {
        Self {
            credentials,
            staleness,
            token_url: TOKEN_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Return a usable access token for the account
    ///
    /// `None` only when the account has no access token at all. The token
    /// value itself is never logged.
    pub fn ensure_fresh(
        &self,
        account: &MailAccount,
        last_sync_at: Option<DateTime<Utc>>,
        store: &dyn LedgerStore,
    ) -> Option<String> {
        let current = account.access_token.clone()?;

        let stale = last_sync_at.is_none_or(|t| Utc::now() - t > self.staleness);
        if !stale {
            debug!("Access token considered fresh; skipping refresh");
            return Some(current);
        }

        let Some(refresh_token) = &account.refresh_token else {
            debug!("No refresh token on file; using existing access token");
            return Some(current);
        };

        let Some(creds) = &self.credentials else {
            warn!("OAuth client credentials missing; using existing access token");
            return Some(current);
        };

        let started = Instant::now();
        match self.refresh(creds, refresh_token) {
            Ok(new_token) => {
                info!(
                    "Refreshed access token in {}ms",
                    started.elapsed().as_millis()
                );
                // Persist right away so a crash mid-sync keeps the new token
                if let Err(e) = store.update_access_token(&account.user_id, &new_token) {
                    warn!("Failed to persist refreshed token: {}", e);
                }
                Some(new_token)
            }
            Err(e) => {
                warn!(
                    "Token refresh failed after {}ms ({}); falling back to existing access token",
                    started.elapsed().as_millis(),
                    e
                );
                Some(current)
            }
        }
    }

    fn refresh(&self, creds: &GoogleCredentials, refresh_token: &str) -> Result<String> {
        let mut response = ureq::post(&self.token_url)
            .send_form([
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Token endpoint request failed")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        Ok(token.access_token)
    }
}
