//! Gmail API integration
//!
//! This module provides:
//! - The `Mailbox` trait the sync engine reads mail through
//! - A Gmail REST client implementing it (search, fetch, retry)
//! - OAuth access-token refresh
//! - Search query construction for the phase windows
//! - Multipart payload decoding to plain text

mod client;
mod normalize;
mod query;
mod token;

pub use client::GmailClient;
pub use normalize::extract_text;
pub use query::build_query;
pub use token::TokenManager;

use anyhow::Result;

/// Non-2xx answer from the mailbox provider
///
/// Kept as a distinct type so phase failures caused by the provider can be
/// reported with a phase-specific message.
#[derive(Debug, thiserror::Error)]
#[error("Mailbox provider returned HTTP {status}")]
pub struct ProviderError {
    pub status: u16,
}

/// A fetched message reduced to what classification needs
#[derive(Debug, Clone)]
pub struct RawEmail {
    pub id: String,
    pub subject: String,
    /// Decoded plain text; empty when the message had no decodable parts
    pub text: String,
}

/// Read access to a mailbox
///
/// The sync engine only sees this trait; production code plugs in
/// [`GmailClient`], tests plug in a scripted stub.
pub trait Mailbox: Send + Sync {
    /// Run a search query and return up to `cap` message ids
    fn search(&self, query: &str, cap: usize) -> Result<Vec<String>>;

    /// Fetch one message and decode it to plain text
    fn fetch(&self, id: &str) -> Result<RawEmail>;
}

/// Gmail API response types
pub mod api {
    use serde::Deserialize;

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
    }

    /// Reference to a message returned by a search
    #[derive(Debug, Deserialize)]
    pub struct MessageRef {
        pub id: String,
    }

    /// Full message from the Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body (base64url encoded)
    #[derive(Debug, Deserialize)]
    pub struct MessageBody {
        pub data: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    impl MessagePayload {
        /// Look up a header value by case-insensitive name
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers.as_ref()?.iter().find_map(|h| {
                if h.name.eq_ignore_ascii_case(name) {
                    Some(h.value.as_str())
                } else {
                    None
                }
            })
        }
    }
}
