//! Per-trigger outcome types
//!
//! Every trigger check resolves to an explicit decision value. Isolation of
//! per-job and per-resource failures is carried in the type instead of
//! relying on broad error capture: a skip is data, not a swallowed exception.

use std::fmt;

/// Outcome of evaluating one trigger path for one job (for the watch path,
/// one decision per watched resource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Enqueue a task with the given provenance
    Fire {
        /// `schedule: <expr>` or `watch: <resource>`
        triggered_by: String,
    },
    /// Nothing to enqueue
    Skip(SkipReason),
}

/// Why a trigger check did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No trigger of this kind configured, or the instant does not match
    NotDue,
    /// The job already fired within this minute (`last_run` guard)
    AlreadyRanThisMinute,
    /// First observation of a (job, resource) pair: recorded, not fired
    Seeded,
    /// Watched resource unchanged since the last observation
    Unchanged,
    /// A configured content or property filter rejected the change
    FilterRejected,
    /// The vault could not answer for this resource
    ResourceUnavailable,
    /// The job's cron expression is malformed
    BadSchedule,
    /// The job's filter configuration is malformed
    BadFilter,
}

impl SkipReason {
    /// Skips that indicate a problem with the job or the vault rather than
    /// ordinary not-due-yet conditions.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable | Self::BadSchedule | Self::BadFilter
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotDue => "not due",
            Self::AlreadyRanThisMinute => "already ran this minute",
            Self::Seeded => "seeded",
            Self::Unchanged => "unchanged",
            Self::FilterRejected => "filter rejected",
            Self::ResourceUnavailable => "resource unavailable",
            Self::BadSchedule => "bad schedule",
            Self::BadFilter => "bad filter",
        };
        f.write_str(text)
    }
}
