//! Trigger evaluation pass
//!
//! One pass walks every enabled job and independently evaluates its two
//! trigger paths. The cron path fires when the expression matches the
//! current minute and the `last_run` guard allows it; the watch path fires
//! when a watched vault resource's mtime moved and the configured filters
//! accept it. Firing writes a queued task record; the job itself is never
//! mutated here. The mtimes tracker is loaded at pass start and flushed
//! wholesale at pass end.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vigil_vault::VaultRead;

use crate::cron;
use crate::error::Result;
use crate::job::{Job, JobStore};
use crate::queue::QueueStore;
use crate::tracker::MtimeTracker;

use super::decision::{SkipReason, TriggerDecision};

/// Counters for one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Jobs considered (enabled, with at least one trigger)
    pub jobs: usize,
    /// Tasks written into the queue
    pub enqueued: usize,
    /// Ordinary skips (not due, seeded, unchanged, deduplicated, filtered)
    pub skipped: usize,
    /// Failure skips (unreachable resources, malformed configuration) and
    /// enqueue errors
    pub errors: usize,
}

/// The trigger evaluator.
pub struct Scheduler {
    jobs: JobStore,
    queue: QueueStore,
    vault: Arc<dyn VaultRead>,
    state_path: PathBuf,
}

impl Scheduler {
    /// Create an evaluator over the given stores. `state_path` is where the
    /// mtimes tracker table lives.
    pub fn new(
        jobs: JobStore,
        queue: QueueStore,
        vault: Arc<dyn VaultRead>,
        state_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jobs,
            queue,
            vault,
            state_path: state_path.into(),
        }
    }

    /// Run one evaluation pass at the given instant.
    ///
    /// Only setup failures (unreadable jobs directory, unwritable tracker)
    /// abort the pass; everything per-job and per-resource is isolated and
    /// reported in the summary.
    pub async fn pass(&self, now: DateTime<Utc>) -> Result<PassSummary> {
        let jobs = self.jobs.list()?;
        let mut tracker = MtimeTracker::load(&self.state_path)?;
        let mut summary = PassSummary::default();

        for job in &jobs {
            if !job.enabled {
                debug!(job = %job.name, "disabled");
                continue;
            }
            if !job.has_trigger() {
                continue;
            }
            summary.jobs += 1;

            if job.schedule.is_some() {
                let decision = self.check_cron(job, now);
                self.settle(job, decision, now, &mut summary);
            }

            for resource in &job.watch {
                let decision = self.check_watch(job, resource, &mut tracker).await;
                self.settle(job, decision, now, &mut summary);
            }
        }

        tracker.flush()?;
        Ok(summary)
    }

    /// Act on one trigger decision: enqueue on fire, count otherwise.
    fn settle(
        &self,
        job: &Job,
        decision: TriggerDecision,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        match decision {
            TriggerDecision::Fire { triggered_by } => {
                match self.queue.enqueue(job, &triggered_by, now) {
                    Ok(name) => {
                        info!(task = %name, trigger = %triggered_by, "enqueued");
                        summary.enqueued += 1;
                    }
                    Err(e) => {
                        warn!(job = %job.name, error = %e, "enqueue failed");
                        summary.errors += 1;
                    }
                }
            }
            TriggerDecision::Skip(reason) => {
                if reason.is_failure() {
                    summary.errors += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }
    }

    /// Time-based trigger path.
    fn check_cron(&self, job: &Job, now: DateTime<Utc>) -> TriggerDecision {
        let Some(expression) = &job.schedule else {
            return TriggerDecision::Skip(SkipReason::NotDue);
        };

        let matched = match cron::matches(expression, now) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(job = %job.name, error = %e, "unusable schedule");
                return TriggerDecision::Skip(SkipReason::BadSchedule);
            }
        };
        if !matched {
            return TriggerDecision::Skip(SkipReason::NotDue);
        }

        // Sole dedup guard: skip when the job already ran this minute.
        if let Some(last_run) = job.last_run {
            if last_run.timestamp() / 60 == now.timestamp() / 60 {
                return TriggerDecision::Skip(SkipReason::AlreadyRanThisMinute);
            }
        }

        TriggerDecision::Fire {
            triggered_by: format!("schedule: {expression}"),
        }
    }

    /// Change-based trigger path, one watched resource at a time.
    async fn check_watch(
        &self,
        job: &Job,
        resource: &str,
        tracker: &mut MtimeTracker,
    ) -> TriggerDecision {
        let mtime = match self.vault.mtime(resource).await {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(job = %job.name, resource, error = %e, "mtime unavailable");
                return TriggerDecision::Skip(SkipReason::ResourceUnavailable);
            }
        };

        let previous = tracker.get(&job.name, resource);
        let bootstrap = tracker.is_first_run();
        // The fresh observation is always recorded, whatever happens next.
        tracker.set(&job.name, resource, mtime);

        if bootstrap || previous.is_none() {
            return TriggerDecision::Skip(SkipReason::Seeded);
        }
        if previous == Some(mtime) {
            return TriggerDecision::Skip(SkipReason::Unchanged);
        }

        if job.match_pattern.is_some() || job.match_property.is_some() {
            match self.passes_filters(job, resource).await {
                FilterOutcome::Pass => {}
                FilterOutcome::Reject => return TriggerDecision::Skip(SkipReason::FilterRejected),
                FilterOutcome::Unavailable => {
                    return TriggerDecision::Skip(SkipReason::ResourceUnavailable)
                }
                FilterOutcome::Malformed => return TriggerDecision::Skip(SkipReason::BadFilter),
            }
        }

        TriggerDecision::Fire {
            triggered_by: format!("watch: {resource}"),
        }
    }

    /// Apply the configured `match` / `match_property` filters.
    async fn passes_filters(&self, job: &Job, resource: &str) -> FilterOutcome {
        if let Some(pattern) = &job.match_pattern {
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(job = %job.name, error = %e, "unusable match pattern");
                    return FilterOutcome::Malformed;
                }
            };
            let content = match self.vault.read(resource).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(job = %job.name, resource, error = %e, "content unavailable");
                    return FilterOutcome::Unavailable;
                }
            };
            if !regex.is_match(&content) {
                return FilterOutcome::Reject;
            }
        }

        if let Some(filter) = &job.match_property {
            let Some((name, expected)) = filter.split_once('=') else {
                warn!(job = %job.name, filter = %filter, "match_property needs name=expected");
                return FilterOutcome::Malformed;
            };
            let value = match self.vault.read_property(name.trim(), resource).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(job = %job.name, resource, error = %e, "property unavailable");
                    return FilterOutcome::Unavailable;
                }
            };
            if value.trim() != expected.trim() {
                return FilterOutcome::Reject;
            }
        }

        FilterOutcome::Pass
    }
}

enum FilterOutcome {
    Pass,
    Reject,
    Unavailable,
    Malformed,
}
