//! Queue processor: the task state machine
//!
//! One invocation processes at most one task: the oldest queued record is
//! marked running *before* the backend is invoked (a crash mid-execution
//! leaves visible evidence instead of silent loss), executed under the hard
//! timeout, given its terminal fields, archived, and reported back onto its
//! source job. Recovering tasks stuck in `running` is out of scope.

use chrono::Utc;
use serde_yaml::Mapping;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::executor::{ExecOutput, ExecutionBackend};
use crate::job::JobStore;
use crate::record;
use crate::task::{Task, TaskStatus};

use super::store::QueueStore;

/// How much captured output a task record keeps.
const RESULT_LIMIT: usize = 500;

/// Summary of one processed task.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Task record name
    pub task: String,
    /// Terminal status
    pub status: TaskStatus,
    /// Backend exit code
    pub exit_code: i32,
    /// Wall-clock execution time, one decimal
    pub duration_seconds: f64,
}

/// Single-worker task processor.
pub struct Processor {
    queue: QueueStore,
    jobs: JobStore,
    backend: Arc<dyn ExecutionBackend>,
}

impl Processor {
    /// Create a processor over the given stores and backend.
    pub fn new(queue: QueueStore, jobs: JobStore, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            queue,
            jobs,
            backend,
        }
    }

    /// Process the oldest queued task; `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<ProcessOutcome>> {
        let Some(task) = self.queue.next_queued()? else {
            return Ok(None);
        };

        info!(task = %task.name, "processing");

        // Running must be visible on disk before the backend starts.
        let mut updates = Mapping::new();
        updates.insert("status".into(), TaskStatus::Running.as_str().into());
        updates.insert(
            "started_at".into(),
            record::format_timestamp(Utc::now()).into(),
        );
        self.queue.update(&task.name, updates)?;

        let prompt = build_prompt(&task);
        let started = Instant::now();
        let output = match self.backend.execute(&prompt).await {
            Ok(output) => output,
            Err(Error::ExecutionTimeout(seconds)) => ExecOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("timeout after {seconds}s"),
            },
            Err(e) => ExecOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        };

        let duration_seconds = (started.elapsed().as_secs_f64() * 10.0).round() / 10.0;
        let finished = Utc::now();
        let status = if output.exit_code == 0 {
            TaskStatus::Done
        } else {
            TaskStatus::Error
        };

        let mut result = truncate_with_marker(output.stdout.trim(), RESULT_LIMIT);
        if result.is_empty() {
            result = output.stderr.chars().take(RESULT_LIMIT).collect();
        }

        let mut updates = Mapping::new();
        updates.insert("status".into(), status.as_str().into());
        updates.insert(
            "finished_at".into(),
            record::format_timestamp(finished).into(),
        );
        updates.insert("duration_seconds".into(), duration_seconds.into());
        updates.insert("exit_code".into(), i64::from(output.exit_code).into());
        updates.insert("result".into(), result.into());
        self.queue.update(&task.name, updates)?;

        self.queue.archive(&task.name)?;
        info!(task = %task.name, %status, duration_seconds, "archived");

        // The task's own terminal state is authoritative; a failed source
        // update is logged, never rolled back.
        if let Some(source) = &task.source {
            if self.jobs.exists(source) {
                if let Err(e) = self.jobs.record_outcome(source, finished, status.as_str()) {
                    warn!(job = %source, error = %e, "failed to update source job");
                }
            }
        }

        Ok(Some(ProcessOutcome {
            task: task.name,
            status,
            exit_code: output.exit_code,
            duration_seconds,
        }))
    }
}

/// Provenance context followed by the task body.
fn build_prompt(task: &Task) -> String {
    let mut parts = Vec::new();
    if let Some(triggered_by) = &task.triggered_by {
        parts.push(format!("This task was triggered by: {triggered_by}"));
    }
    if let Some(source) = &task.source {
        parts.push(format!("Source job: {source}"));
    }
    parts.push(task.body.trim().to_string());
    parts.join("\n\n")
}

/// Character-safe truncation with an ellipsis marker.
fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    }
}
