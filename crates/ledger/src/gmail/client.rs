//! Gmail API HTTP client
//!
//! Implements [`Mailbox`] over the Gmail REST API. Uses synchronous HTTP
//! (ureq) to be executor-agnostic; concurrency comes from the batch
//! processor, not the client.

use anyhow::{Context, Result};
use std::time::Duration;

use super::api::{GmailMessage, ListMessagesResponse};
use super::{Mailbox, ProviderError, RawEmail, extract_text};

/// Gmail API client scoped to one access token
pub struct GmailClient {
    access_token: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Retries per message fetch before the message is given up on
    const FETCH_RETRIES: u32 = 3;

    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// List one page of message ids matching a search query
    fn list_page(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            max_results.min(500),
            urlencoding::encode(query)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let mut response = self.get(&url).context("Failed to list messages")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")
    }

    /// Get full message details by id
    fn get_message(&self, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/users/me/messages/{}?format=full", Self::BASE_URL, id);

        let mut response = self.get(&url).context("Failed to fetch message")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")
    }

    /// Get a message with exponential backoff retry
    fn get_message_with_retry(&self, id: &str, max_retries: u32) -> Result<GmailMessage> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..max_retries {
            match self.get_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        let jitter = Duration::from_millis(rand_jitter());
                        std::thread::sleep(delay + jitter);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Fetch retries exhausted")))
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
        match ureq::get(url)
            .header("Authorization", &format!("Bearer {}", self.access_token))
            .call()
        {
            Ok(response) => Ok(response),
            Err(ureq::Error::StatusCode(status)) => Err(ProviderError { status }.into()),
            Err(e) => Err(e).context("Mailbox request failed"),
        }
    }
}

impl Mailbox for GmailClient {
    /// Run a search and collect ids across pages, up to `cap`
    fn search(&self, query: &str, cap: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token = None;

        loop {
            if ids.len() >= cap {
                break;
            }

            let response = self.list_page(query, cap - ids.len(), page_token.as_deref())?;

            if let Some(messages) = response.messages {
                ids.extend(messages.into_iter().map(|m| m.id));
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(cap);
        Ok(ids)
    }

    fn fetch(&self, id: &str) -> Result<RawEmail> {
        let message = self.get_message_with_retry(id, Self::FETCH_RETRIES)?;

        let (subject, text) = match &message.payload {
            Some(payload) => (
                payload.header("Subject").unwrap_or_default().to_string(),
                extract_text(payload),
            ),
            None => (String::new(), String::new()),
        };

        Ok(RawEmail {
            id: message.id,
            subject,
            text,
        })
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
