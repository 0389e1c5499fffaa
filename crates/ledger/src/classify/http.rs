//! HTTP-backed extractor
//!
//! Sends subject and body to the classification service with the prompt
//! contract and recovers the structured answer from the response text.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::parsing::parse_extraction;
use super::{Extraction, Extractor};
use crate::config::ClassifierConfig;

/// Body text beyond this many characters is not sent to the classifier
const PROMPT_BODY_MAX: usize = 4000;

/// The prompt contract
///
/// The precedence ladder is load-bearing: the service must check the rules
/// in this order and stop at the first match.
const CLASSIFY_PROMPT: &str = r#"You are a bank-email classifier. Decide whether the email below describes a single completed money transaction.

If it does not, answer {"is_transaction": false}.

If it does, answer one JSON object with the fields:
  amount (positive number), date (string, as written in the email),
  merchant, description, type ("credit" | "debit" | "refund"),
  category, payment_method, confidence (0 to 1).

Pick the category by checking these rules IN ORDER and stopping at the first match:
1. The narration carries an explicit transfer marker: P2A means person-to-account, use "p2a_transfer"; P2M means person-to-merchant, use "p2m_payment".
2. The counterparty is a known investment platform (Zerodha, Groww, Upstox, mutual fund houses): use "investment".
3. The text marks a credit card bill payment: use "credit_card_bill".
4. Loan EMI keywords (EMI, installment, loan repayment): use "emi".
5. Salary keywords (salary, payroll, stipend): use "salary".
6. A recognizable merchant maps to one of: food_dining, groceries, shopping, travel, utilities, entertainment.
7. Otherwise: "refund" for reversals, "transfer" for plain account transfers, else "other".

payment_method should be one of UPI-P2A, UPI-P2M, UPI, Credit Card, Debit Card, NEFT, IMPS, RTGS, Other when recognizable.

Answer with the JSON object only."#;

/// Extractor backed by an LLM service over JSON/HTTP
pub struct HttpExtractor {
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    response: String,
}

impl HttpExtractor {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn build_prompt(subject: &str, body: &str) -> String {
        let body = if body.chars().count() > PROMPT_BODY_MAX {
            body.chars().take(PROMPT_BODY_MAX).collect()
        } else {
            body.to_string()
        };

        format!(
            "{}\n\nSubject: {}\n\nBody: {}",
            CLASSIFY_PROMPT, subject, body
        )
    }
}

impl Extractor for HttpExtractor {
    fn classify(&self, subject: &str, body: &str) -> Result<Extraction> {
        let request = ClassifyRequest {
            model: &self.model,
            prompt: Self::build_prompt(subject, body),
            stream: false,
        };

        let mut response = ureq::post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request)
            .context("Classification request failed")?;

        let answer: ClassifyResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse classification response")?;

        parse_extraction(&answer.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_truncates_body() {
        let body = "x".repeat(10_000);
        let prompt = HttpExtractor::build_prompt("Alert", &body);
        assert!(prompt.len() < CLASSIFY_PROMPT.len() + PROMPT_BODY_MAX + 100);
        assert!(prompt.contains("Subject: Alert"));
    }

    #[test]
    fn test_prompt_carries_precedence_ladder() {
        let prompt = HttpExtractor::build_prompt("s", "b");
        let p2a = prompt.find("p2a_transfer").unwrap();
        let investment = prompt.find("\"investment\"").unwrap();
        let salary = prompt.find("\"salary\"").unwrap();
        assert!(p2a < investment && investment < salary);
    }
}
