//! Historical scan phases
//!
//! A sync walks the mailbox in four windows of increasing age. Windows are
//! contiguous and non-overlapping: each phase's end is the next-younger
//! phase's start, and together they tile the last 18 months. They are
//! recomputed from "now" when each phase starts, not pinned at sync start.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four historical scan windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    #[serde(rename = "phase_1")]
    Phase1,
    #[serde(rename = "phase_2")]
    Phase2,
    #[serde(rename = "phase_3")]
    Phase3,
    #[serde(rename = "phase_4")]
    Phase4,
}

/// A half-open `[start, end)` date window
///
/// `end` is `None` for the youngest phase, which runs up to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl SyncPhase {
    /// All phases in execution order
    pub fn all() -> [SyncPhase; 4] {
        [
            SyncPhase::Phase1,
            SyncPhase::Phase2,
            SyncPhase::Phase3,
            SyncPhase::Phase4,
        ]
    }

    /// The phases that run on the background continuation
    pub fn background() -> [SyncPhase; 3] {
        [SyncPhase::Phase2, SyncPhase::Phase3, SyncPhase::Phase4]
    }

    pub fn number(&self) -> u8 {
        match self {
            SyncPhase::Phase1 => 1,
            SyncPhase::Phase2 => 2,
            SyncPhase::Phase3 => 3,
            SyncPhase::Phase4 => 4,
        }
    }

    /// The date window this phase scans, anchored at `now`
    pub fn window(&self, now: DateTime<Utc>) -> PhaseWindow {
        match self {
            SyncPhase::Phase1 => PhaseWindow {
                start: now - Days::new(45),
                end: None,
            },
            SyncPhase::Phase2 => PhaseWindow {
                start: now - Months::new(3),
                end: Some(now - Days::new(45)),
            },
            SyncPhase::Phase3 => PhaseWindow {
                start: now - Months::new(6),
                end: Some(now - Months::new(3)),
            },
            SyncPhase::Phase4 => PhaseWindow {
                start: now - Months::new(18),
                end: Some(now - Months::new(6)),
            },
        }
    }

    /// Human-readable span for status text
    pub fn descriptor(&self) -> &'static str {
        match self {
            SyncPhase::Phase1 => "the last 45 days",
            SyncPhase::Phase2 => "45 days to 3 months back",
            SyncPhase::Phase3 => "3 to 6 months back",
            SyncPhase::Phase4 => "6 to 18 months back",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase_{}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_windows_are_contiguous() {
        let now = fixed_now();
        let phases = SyncPhase::all();
        for pair in phases.windows(2) {
            let younger = pair[0].window(now);
            let older = pair[1].window(now);
            // Each older phase ends exactly where the younger one starts
            assert_eq!(older.end, Some(younger.start));
        }
    }

    #[test]
    fn test_windows_jointly_cover_18_months() {
        let now = fixed_now();
        let newest = SyncPhase::Phase1.window(now);
        let oldest = SyncPhase::Phase4.window(now);
        assert_eq!(newest.end, None);
        assert_eq!(oldest.start, now - Months::new(18));
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let now = fixed_now();
        let phases = SyncPhase::all();
        for (i, a) in phases.iter().enumerate() {
            for b in &phases[i + 1..] {
                let wa = a.window(now);
                let wb = b.window(now);
                // b is strictly older: its whole span sits before a's start
                assert!(wb.end.unwrap() <= wa.start);
            }
        }
    }

    #[test]
    fn test_phase_one_window() {
        let now = fixed_now();
        let window = SyncPhase::Phase1.window(now);
        assert_eq!(window.start, now - Days::new(45));
        assert_eq!(window.end, None);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(SyncPhase::Phase1.to_string(), "phase_1");
        assert_eq!(SyncPhase::Phase4.to_string(), "phase_4");
    }
}
