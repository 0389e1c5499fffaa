//! Transaction model extracted from a bank email

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length for the merchant field (characters)
const MERCHANT_MAX_LEN: usize = 120;
/// Maximum stored length for the description field (characters)
const DESCRIPTION_MAX_LEN: usize = 500;
/// Maximum stored length for the raw subject provenance field (characters)
const RAW_SUBJECT_MAX_LEN: usize = 200;
/// Maximum stored length for the raw body provenance field (characters)
const RAW_BODY_MAX_LEN: usize = 1000;

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    Credit,
    Debit,
    Refund,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Credit => "credit",
            TxnType::Debit => "debit",
            TxnType::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TxnType::Credit),
            "debit" => Some(TxnType::Debit),
            "refund" => Some(TxnType::Refund),
            _ => None,
        }
    }
}

/// Closed set of transaction categories
///
/// `Groceries` is kept distinct at ingestion time; [`Category::canonical`]
/// collapses it for consumers that aggregate over the reduced set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Salary,
    FoodDining,
    Shopping,
    Travel,
    Utilities,
    Entertainment,
    Investment,
    Refund,
    Emi,
    Transfer,
    Other,
    P2aTransfer,
    P2mPayment,
    CreditCardBill,
    Groceries,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Salary => "salary",
            Category::FoodDining => "food_dining",
            Category::Shopping => "shopping",
            Category::Travel => "travel",
            Category::Utilities => "utilities",
            Category::Entertainment => "entertainment",
            Category::Investment => "investment",
            Category::Refund => "refund",
            Category::Emi => "emi",
            Category::Transfer => "transfer",
            Category::Other => "other",
            Category::P2aTransfer => "p2a_transfer",
            Category::P2mPayment => "p2m_payment",
            Category::CreditCardBill => "credit_card_bill",
            Category::Groceries => "groceries",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "salary" => Some(Category::Salary),
            "food_dining" => Some(Category::FoodDining),
            "shopping" => Some(Category::Shopping),
            "travel" => Some(Category::Travel),
            "utilities" => Some(Category::Utilities),
            "entertainment" => Some(Category::Entertainment),
            "investment" => Some(Category::Investment),
            "refund" => Some(Category::Refund),
            "emi" => Some(Category::Emi),
            "transfer" => Some(Category::Transfer),
            "other" => Some(Category::Other),
            "p2a_transfer" => Some(Category::P2aTransfer),
            "p2m_payment" => Some(Category::P2mPayment),
            "credit_card_bill" => Some(Category::CreditCardBill),
            "groceries" => Some(Category::Groceries),
            _ => None,
        }
    }

    /// Collapse into the reduced set used by spending aggregation
    pub fn canonical(self) -> Category {
        match self {
            Category::Groceries => Category::FoodDining,
            other => other,
        }
    }
}

/// A persisted transaction, keyed by `(user_id, email_id)`
///
/// Created once at extraction time and never updated or deleted by the
/// pipeline. Re-tagging by the user happens downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    /// Source message id; half of the dedup key
    pub email_id: String,
    /// Positive amount in the account currency
    pub amount: f64,
    /// Transaction timestamp; ingestion time when the source text had none
    pub date: DateTime<Utc>,
    pub txn_type: TxnType,
    pub category: Category,
    pub merchant: String,
    pub description: String,
    /// Free text; UPI-P2A, UPI-P2M, UPI, Credit Card, Debit Card, NEFT,
    /// IMPS, RTGS and Other are the recommended values
    pub payment_method: String,
    /// Extractor certainty in [0, 1]; stored but not used to gate persistence
    pub confidence: f64,
    /// Provenance for audit
    pub raw_subject: String,
    /// Provenance for audit, truncated
    pub raw_body: String,
}

/// Strip HTML-special characters and cap the length of free text
///
/// Applied to every extractor-produced string before it is persisted.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect();
    truncate_chars(cleaned.split_whitespace().collect::<Vec<_>>().join(" "), max_len)
}

fn truncate_chars(s: String, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s
    } else {
        s.chars().take(max_len).collect()
    }
}

impl Transaction {
    /// Field caps applied when building a transaction from extractor output
    pub(crate) const MERCHANT_MAX: usize = MERCHANT_MAX_LEN;
    pub(crate) const DESCRIPTION_MAX: usize = DESCRIPTION_MAX_LEN;
    pub(crate) const RAW_SUBJECT_MAX: usize = RAW_SUBJECT_MAX_LEN;
    pub(crate) const RAW_BODY_MAX: usize = RAW_BODY_MAX_LEN;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_html_specials() {
        assert_eq!(sanitize_text("<b>Cafe</b> & Co", 100), "bCafe/b Co");
        assert_eq!(sanitize_text("plain merchant", 100), "plain merchant");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_text("  Big   Bazaar \n Store ", 100), "Big Bazaar Store");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "m".repeat(300);
        assert_eq!(sanitize_text(&long, 120).chars().count(), 120);
    }

    #[test]
    fn test_category_round_trip() {
        for category in [
            Category::Salary,
            Category::P2aTransfer,
            Category::CreditCardBill,
            Category::Groceries,
        ] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("snacks"), None);
    }

    #[test]
    fn test_groceries_collapses() {
        assert_eq!(Category::Groceries.canonical(), Category::FoodDining);
        assert_eq!(Category::Travel.canonical(), Category::Travel);
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&Category::P2mPayment).unwrap();
        assert_eq!(json, r#""p2m_payment""#);
        let parsed: Category = serde_json::from_str(r#""credit_card_bill""#).unwrap();
        assert_eq!(parsed, Category::CreditCardBill);
    }
}
