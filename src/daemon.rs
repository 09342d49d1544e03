//! Daemon loop
//!
//! Drives the trigger evaluator and the queue processor on independent
//! timers. Passes never overlap: each one takes the pass lock, and a pass
//! that finds the lock held (another vigil invocation, or a one-shot run
//! from the CLI) is skipped rather than queued up. Pass failures are logged
//! and the loop keeps going; only cancellation stops it.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vigil_core::{Error, PassLock, Processor, Scheduler};

/// The periodic driver for both passes.
pub struct Daemon {
    scheduler: Scheduler,
    processor: Processor,
    lock_path: PathBuf,
    schedule_interval: Duration,
    process_interval: Duration,
}

impl Daemon {
    /// Create a daemon over the given passes.
    pub fn new(
        scheduler: Scheduler,
        processor: Processor,
        lock_path: PathBuf,
        schedule_interval: Duration,
        process_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            processor,
            lock_path,
            schedule_interval,
            process_interval,
        }
    }

    /// Run until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            schedule_interval = self.schedule_interval.as_secs(),
            process_interval = self.process_interval.as_secs(),
            "daemon started"
        );

        let mut schedule_timer = tokio::time::interval(self.schedule_interval);
        let mut process_timer = tokio::time::interval(self.process_interval);

        loop {
            tokio::select! {
                _ = schedule_timer.tick() => self.evaluate().await,
                _ = process_timer.tick() => self.process().await,
                _ = shutdown.cancelled() => {
                    info!("daemon shutting down");
                    break;
                }
            }
        }
    }

    async fn evaluate(&self) {
        let Some(_lock) = self.acquire_lock() else {
            return;
        };
        match self.scheduler.pass(Utc::now()).await {
            Ok(summary) if summary.enqueued > 0 || summary.errors > 0 => info!(
                jobs = summary.jobs,
                enqueued = summary.enqueued,
                skipped = summary.skipped,
                errors = summary.errors,
                "evaluation pass finished"
            ),
            Ok(_) => debug!("evaluation pass: nothing to do"),
            Err(e) => error!(error = %e, "evaluation pass failed"),
        }
    }

    async fn process(&self) {
        let Some(_lock) = self.acquire_lock() else {
            return;
        };
        match self.processor.process_next().await {
            Ok(Some(outcome)) => info!(
                task = %outcome.task,
                status = %outcome.status,
                exit_code = outcome.exit_code,
                duration_seconds = outcome.duration_seconds,
                "task processed"
            ),
            Ok(None) => debug!("queue is empty"),
            Err(e) => error!(error = %e, "processing pass failed"),
        }
    }

    fn acquire_lock(&self) -> Option<PassLock> {
        match PassLock::acquire(&self.lock_path) {
            Ok(lock) => Some(lock),
            Err(Error::LockHeld(path)) => {
                warn!(path = %path.display(), "pass lock held, skipping this tick");
                None
            }
            Err(e) => {
                error!(error = %e, "could not acquire pass lock");
                None
            }
        }
    }
}
