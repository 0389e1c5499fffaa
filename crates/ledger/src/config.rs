//! Configuration for the ingestion pipeline
//!
//! Three pieces: the Google OAuth client used for token refresh, the
//! classification service endpoint, and the sync tuning knobs. OAuth
//! credentials load from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Credentials filename in the Moneta config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";
/// Classifier config filename in the Moneta config directory
const CLASSIFIER_FILE: &str = "classifier.json";
/// Sync settings filename in the Moneta config directory
const SETTINGS_FILE: &str = "sync-settings.json";

/// OAuth client credentials for the Gmail token endpoint
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GoogleCredentials {
    /// Load credentials using the documented priority order
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Credentials embedded at compile time.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Both "installed" (desktop) and "web" credential types are accepted
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from a JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// Endpoint and credential for the external classification service
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "gemini-flash".to_string()
}

impl ClassifierConfig {
    /// Load from the config file, falling back to environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CLASSIFIER_FILE) {
            return config::load_json(CLASSIFIER_FILE);
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("CLASSIFIER_ENDPOINT")
            .context("CLASSIFIER_ENDPOINT environment variable not set")?;
        let api_key = std::env::var("CLASSIFIER_API_KEY")
            .context("CLASSIFIER_API_KEY environment variable not set")?;
        let model = std::env::var("CLASSIFIER_MODEL").unwrap_or_else(|_| default_model());

        Ok(Self {
            endpoint,
            api_key,
            model,
        })
    }
}

/// Known financial-institution sending domains
///
/// Only mail from these senders is considered by the mailbox search.
pub const FINANCIAL_SENDER_DOMAINS: &[&str] = &[
    "alerts.hdfcbank.net",
    "icicibank.com",
    "axisbank.com",
    "sbi.co.in",
    "kotak.com",
    "yesbank.in",
    "idfcfirstbank.com",
    "indusind.com",
    "federalbank.co.in",
    "rblbank.com",
    "aubank.in",
    "bankofbaroda.co.in",
    "pnb.co.in",
    "unionbankofindia.co.in",
    "canarabank.co.in",
    "sc.com",
    "paytm.com",
    "phonepe.com",
    "amazonpay.in",
    "cred.club",
];

/// Keywords a transaction mail must contain at least one of
pub const TRANSACTION_KEYWORDS: &[&str] = &[
    "transaction",
    "debited",
    "credited",
    "spent",
    "received",
    "payment",
];

/// Tuning knobs for a sync run
///
/// `Default` carries the shipped constants; a `sync-settings.json` file in
/// the config directory may override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Messages dispatched concurrently per batch
    pub batch_size: usize,
    /// Result cap for one mailbox search
    pub page_cap: usize,
    /// Sender allow-list used by the query builder
    pub sender_domains: Vec<String>,
    /// Keyword disjunction used by the query builder
    pub keywords: Vec<String>,
    /// Assumed per-message processing cost, for the completion estimate
    pub per_message_cost_ms: u64,
    /// Access-token staleness threshold before a refresh is attempted
    pub token_staleness_mins: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            page_cap: 500,
            sender_domains: FINANCIAL_SENDER_DOMAINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keywords: TRANSACTION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            per_message_cost_ms: 600,
            token_staleness_mins: 48,
        }
    }
}

impl SyncSettings {
    /// Load overrides from the config file, or the defaults
    pub fn load() -> Self {
        if config::config_exists(SETTINGS_FILE) {
            match config::load_json(SETTINGS_FILE) {
                Ok(settings) => return settings,
                Err(e) => log::warn!("Ignoring invalid {}: {}", SETTINGS_FILE, e),
            }
        }
        Self::default()
    }

    pub fn per_message_cost(&self) -> Duration {
        Duration::from_millis(self.per_message_cost_ms)
    }

    pub fn token_staleness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_staleness_mins as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
    }

    #[test]
    fn test_invalid_credentials_json() {
        let json = r#"{ "other": {} }"#;
        assert!(GoogleCredentials::from_json(json).is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.batch_size, 20);
        assert_eq!(settings.page_cap, 500);
        assert_eq!(settings.sender_domains.len(), 20);
        assert_eq!(settings.token_staleness_mins, 48);
    }

    #[test]
    fn test_settings_partial_override() {
        let settings: SyncSettings = serde_json::from_str(r#"{"batch_size": 5}"#).unwrap();
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.page_cap, 500);
    }
}
