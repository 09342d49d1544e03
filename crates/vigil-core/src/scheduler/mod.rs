//! Trigger evaluation
//!
//! Decides, once per pass, which jobs should fire and materializes each
//! firing as a queued task:
//!
//! - **Cron path**: the job's `schedule` expression matches the current
//!   minute, deduplicated through the `last_run` guard
//! - **Watch path**: a watched vault resource's modification time moved
//!   since the last pass, deduplicated through the mtimes tracker and
//!   filtered by `match` / `match_property`
//!
//! The evaluator and the queue processor only meet in the queue directory;
//! neither calls the other.

mod decision;
mod evaluator;

pub use decision::{SkipReason, TriggerDecision};
pub use evaluator::{PassSummary, Scheduler};
