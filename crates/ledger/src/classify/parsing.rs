//! Parsing and validation of classifier responses
//!
//! Models wrap their structured answer in prose or markdown fences often
//! enough that the raw response cannot be fed to serde directly: the first
//! balanced JSON object is located by brace matching and only that slice is
//! parsed.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use super::{Extraction, TransactionCandidate};
use crate::models::{Category, Transaction, TxnType, sanitize_text};

/// Wire shape the classification service is asked to produce
#[derive(Debug, Deserialize)]
struct ExtractionWire {
    is_transaction: bool,
    amount: Option<f64>,
    date: Option<String>,
    merchant: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    txn_type: Option<TxnType>,
    category: Option<Category>,
    payment_method: Option<String>,
    confidence: Option<f64>,
}

/// Parse a raw classifier response into an [`Extraction`]
///
/// Fails on missing JSON, malformed fields, a non-positive amount, or a
/// category outside the closed set; callers treat any failure as a
/// per-message skip.
pub fn parse_extraction(raw: &str) -> Result<Extraction> {
    let json = first_json_object(raw).context("No JSON object in classifier response")?;

    let wire: ExtractionWire =
        serde_json::from_str(json).context("Malformed classifier response")?;

    if !wire.is_transaction {
        return Ok(Extraction::NotATransaction);
    }

    let amount = wire.amount.context("Transaction missing amount")?;
    if !(amount > 0.0) {
        bail!("Transaction amount must be positive, got {}", amount);
    }

    let txn_type = wire.txn_type.context("Transaction missing type")?;
    let category = wire.category.context("Transaction missing category")?;

    Ok(Extraction::Transaction(TransactionCandidate {
        amount,
        date: wire.date.as_deref().and_then(parse_date),
        merchant: sanitize_text(
            wire.merchant.as_deref().unwrap_or_default(),
            Transaction::MERCHANT_MAX,
        ),
        description: sanitize_text(
            wire.description.as_deref().unwrap_or_default(),
            Transaction::DESCRIPTION_MAX,
        ),
        txn_type,
        category,
        payment_method: wire
            .payment_method
            .unwrap_or_else(|| "Other".to_string()),
        confidence: wire.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    }))
}

/// Locate the first balanced JSON object in a response
///
/// Brace depth is tracked outside of string literals so braces inside field
/// values don't end the scan early.
fn first_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in response[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a transaction date from the handful of formats bank mails use
///
/// `None` when nothing matches; the caller substitutes the ingestion
/// timestamp.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_plain_transaction() {
        let raw = r#"{"is_transaction": true, "amount": 450.0, "date": "2025-05-20",
            "merchant": "Swiggy", "description": "Food order", "type": "debit",
            "category": "food_dining", "payment_method": "UPI", "confidence": 0.92}"#;
        let Extraction::Transaction(candidate) = parse_extraction(raw).unwrap() else {
            panic!("expected a transaction");
        };
        assert_eq!(candidate.amount, 450.0);
        assert_eq!(candidate.merchant, "Swiggy");
        assert_eq!(candidate.txn_type, TxnType::Debit);
        assert_eq!(candidate.category, Category::FoodDining);
        assert_eq!(candidate.confidence, 0.92);
    }

    #[test]
    fn test_parse_not_a_transaction() {
        let raw = r#"{"is_transaction": false}"#;
        assert_eq!(parse_extraction(raw).unwrap(), Extraction::NotATransaction);
    }

    #[test]
    fn test_parse_fenced_response() {
        let raw = "Here is the classification:\n```json\n{\"is_transaction\": false}\n```\nDone!";
        assert_eq!(parse_extraction(raw).unwrap(), Extraction::NotATransaction);
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"{"is_transaction": true, "amount": 100.0, "type": "debit",
            "category": "other", "merchant": "A{B}C", "description": "note } here"}"#;
        let Extraction::Transaction(candidate) = parse_extraction(raw).unwrap() else {
            panic!("expected a transaction");
        };
        assert_eq!(candidate.merchant, "A{B}C");
    }

    #[test]
    fn test_no_json_is_error() {
        assert!(parse_extraction("I could not classify this email.").is_err());
    }

    #[test]
    fn test_unknown_category_is_error() {
        let raw = r#"{"is_transaction": true, "amount": 10.0, "type": "debit", "category": "snacks"}"#;
        assert!(parse_extraction(raw).is_err());
    }

    #[test]
    fn test_non_positive_amount_is_error() {
        let raw = r#"{"is_transaction": true, "amount": 0.0, "type": "debit", "category": "other"}"#;
        assert!(parse_extraction(raw).is_err());
        let raw = r#"{"is_transaction": true, "amount": -5.0, "type": "debit", "category": "other"}"#;
        assert!(parse_extraction(raw).is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let raw = r#"{"is_transaction": true, "amount": 10.0, "type": "credit",
            "category": "salary", "confidence": 1.7}"#;
        let Extraction::Transaction(candidate) = parse_extraction(raw).unwrap() else {
            panic!("expected a transaction");
        };
        assert_eq!(candidate.confidence, 1.0);
    }

    #[test]
    fn test_merchant_sanitized() {
        let raw = r#"{"is_transaction": true, "amount": 10.0, "type": "debit",
            "category": "shopping", "merchant": "Big<b>Bazaar</b>"}"#;
        let Extraction::Transaction(candidate) = parse_extraction(raw).unwrap() else {
            panic!("expected a transaction");
        };
        assert!(!candidate.merchant.contains('<'));
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(
            parse_date("2025-05-20").unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
        );
        assert_eq!(
            parse_date("20/05/2025").unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
        );
        assert_eq!(
            parse_date("20 May 2025").unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
        );
        assert_eq!(parse_date("2025-05-20T08:30:00Z").unwrap().hour(), 8);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_first_json_object_nested() {
        let raw = r#"prefix {"a": {"b": 1}} suffix"#;
        assert_eq!(first_json_object(raw), Some(r#"{"a": {"b": 1}}"#));
    }
}
