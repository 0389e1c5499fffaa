//! Phased mailbox sync
//!
//! The engine drives four sequential historical windows: phase 1 runs
//! synchronously with the trigger, phases 2-4 continue on a detached
//! background thread. Every phase repeats the same fetch / classify /
//! persist / report cycle.

mod batch;
mod engine;
mod phases;
mod progress;

pub use engine::{BACKGROUND_FAILURE_MESSAGE, SyncEngine, SyncOutcome};
pub use phases::{PhaseWindow, SyncPhase};
pub use progress::StatusFeed;
