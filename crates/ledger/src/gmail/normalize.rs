//! Gmail payload decoding to plain text
//!
//! Walks the multipart tree, base64url-decodes every text-bearing leaf in
//! traversal order, then strips HTML tags, unescapes the standard entities,
//! and collapses whitespace. A message with no decodable parts yields an
//! empty string, never an error.

use base64::prelude::*;

use super::api::{MessagePart, MessagePayload};

/// Decode a message payload to normalized plain text
pub fn extract_text(payload: &MessagePayload) -> String {
    let mut pieces = Vec::new();

    // A non-multipart message carries its data directly on the payload
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && let Some(text) = decode_base64_body(data)
    {
        pieces.push(text);
    }

    if let Some(parts) = &payload.parts {
        collect_text_parts(parts, &mut pieces);
    }

    let joined = pieces.join(" ");
    collapse_whitespace(&unescape_entities(&strip_html(&joined)))
}

/// Recursively collect decoded text from all text-bearing leaf parts
fn collect_text_parts(parts: &[MessagePart], out: &mut Vec<String>) {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            out.push(text);
        }

        if let Some(nested) = &part.parts {
            collect_text_parts(nested, out);
        }
    }
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so several decoders are
/// tried in turn.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    for decoder in decoders {
        if let Ok(decoded) = decoder.decode(data)
            && let Ok(s) = String::from_utf8(decoded)
        {
            return Some(s);
        }
    }

    None
}

/// Remove everything between `<` and `>`
fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Unescape the standard HTML entities
///
/// `&amp;` goes last so `&amp;lt;` stays a literal `&lt;` rather than being
/// unescaped twice.
fn unescape_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::MessageBody;
    use base64::prelude::*;

    fn encode(text: &str) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(text)
    }

    fn text_part(mime: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(MessageBody {
                data: Some(encode(text)),
            }),
            parts: None,
        }
    }

    #[test]
    fn test_simple_body() {
        let payload = MessagePayload {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessageBody {
                data: Some(encode("Rs.450 debited from your account")),
            }),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "Rs.450 debited from your account");
    }

    #[test]
    fn test_nested_parts_concatenate_in_order() {
        let payload = MessagePayload {
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![
                text_part("text/plain", "first"),
                MessagePart {
                    mime_type: Some("multipart/related".to_string()),
                    body: None,
                    parts: Some(vec![
                        text_part("text/plain", "second"),
                        text_part("text/html", "<p>third</p>"),
                    ]),
                },
            ]),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "first second third");
    }

    #[test]
    fn test_non_text_parts_skipped() {
        let payload = MessagePayload {
            parts: Some(vec![
                text_part("text/plain", "visible"),
                text_part("image/png", "binarybinarybinary"),
            ]),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "visible");
    }

    #[test]
    fn test_no_decodable_parts_yields_empty() {
        let payload = MessagePayload::default();
        assert_eq!(extract_text(&payload), "");
    }

    #[test]
    fn test_entities_and_tags_round_trip() {
        let payload = MessagePayload {
            parts: Some(vec![text_part(
                "text/html",
                "You &amp; your card: balance &lt; limit, see <b>details</b>  now",
            )]),
            ..Default::default()
        };
        assert_eq!(
            extract_text(&payload),
            "You & your card: balance < limit, see details now"
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        let payload = MessagePayload {
            parts: Some(vec![text_part("text/plain", "a\n\n  b\t c")]),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "a b c");
    }

    #[test]
    fn test_nbsp_becomes_space() {
        let payload = MessagePayload {
            parts: Some(vec![text_part("text/plain", "INR&nbsp;1,200.00")]),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "INR 1,200.00");
    }

    #[test]
    fn test_standard_base64_accepted() {
        let payload = MessagePayload {
            body: Some(MessageBody {
                data: Some(BASE64_STANDARD.encode("padded+text/here")),
            }),
            ..Default::default()
        };
        assert_eq!(extract_text(&payload), "padded+text/here");
    }
}
