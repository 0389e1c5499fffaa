//! Search query construction for phase windows
//!
//! A query ORs the sender allow-list, ANDs it with the transaction keyword
//! disjunction, and bounds both with the phase's date window using Gmail's
//! `after:`/`before:` operators.

use chrono::{DateTime, Utc};

use crate::config::SyncSettings;
use crate::sync::PhaseWindow;

/// Build the Gmail search query for one phase window
pub fn build_query(settings: &SyncSettings, window: &PhaseWindow) -> String {
    let senders = settings.sender_domains.join(" OR ");
    let keywords = settings.keywords.join(" OR ");

    let mut query = format!(
        "from:({}) ({}) after:{}",
        senders,
        keywords,
        format_date(window.start)
    );

    if let Some(end) = window.end {
        query.push_str(&format!(" before:{}", format_date(end)));
    }

    query
}

/// Gmail date operators take YYYY/MM/DD
fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y/%m/%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncPhase;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_open_ended_window_has_no_before() {
        let settings = SyncSettings::default();
        let query = build_query(&settings, &SyncPhase::Phase1.window(fixed_now()));
        assert!(query.contains("after:2025/05/01"));
        assert!(!query.contains("before:"));
    }

    #[test]
    fn test_bounded_window() {
        let settings = SyncSettings::default();
        let query = build_query(&settings, &SyncPhase::Phase2.window(fixed_now()));
        assert!(query.contains("after:2025/03/15"));
        assert!(query.contains("before:2025/05/01"));
    }

    #[test]
    fn test_senders_and_keywords_present() {
        let settings = SyncSettings::default();
        let query = build_query(&settings, &SyncPhase::Phase1.window(fixed_now()));
        assert!(query.starts_with("from:(alerts.hdfcbank.net OR "));
        assert!(query.contains("(transaction OR debited OR credited OR spent OR received OR payment)"));
    }

    #[test]
    fn test_custom_allow_list() {
        let settings = SyncSettings {
            sender_domains: vec!["bank.example".to_string()],
            keywords: vec!["debited".to_string()],
            ..SyncSettings::default()
        };
        let query = build_query(&settings, &SyncPhase::Phase1.window(fixed_now()));
        assert!(query.starts_with("from:(bank.example) (debited) after:"));
    }
}
