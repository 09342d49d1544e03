//! Task records and the task lifecycle
//!
//! A task is one materialized execution of a job. Status moves strictly
//! queued → running → done/error; a task never re-enters the queue once it
//! has left it.

use chrono::{DateTime, Utc};
use serde_yaml::Mapping;
use std::fmt;

use crate::record::{self, Record};

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting in the active partition
    Queued,
    /// Picked up by the processor; backend invocation in flight
    Running,
    /// Finished with exit code 0
    Done,
    /// Non-zero exit, timeout, or invocation failure
    Error,
}

impl TaskStatus {
    /// Parse a status tag; unknown tags yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Status tag as written into record headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Done and error are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed task record.
#[derive(Debug, Clone)]
pub struct Task {
    /// Task identity: `<timestamp>--<job name>`
    pub name: String,
    /// Name of the job this task was materialized from
    pub source: Option<String>,
    /// Provenance: `schedule: <expr>` or `watch: <resource>`
    pub triggered_by: Option<String>,
    /// When the trigger evaluator enqueued the task
    pub queued_at: Option<DateTime<Utc>>,
    /// When the processor picked the task up
    pub started_at: Option<DateTime<Utc>>,
    /// When execution finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Lifecycle state; `None` for pre-status records (treated as queued)
    pub status: Option<TaskStatus>,
    /// Wall-clock execution time, one decimal
    pub duration_seconds: Option<f64>,
    /// Backend exit code; -1 for timeout or invocation failure
    pub exit_code: Option<i32>,
    /// Truncated output (or stderr fallback)
    pub result: Option<String>,
    /// Prompt payload copied from the job at enqueue time
    pub body: String,
    /// Unrecognized header fields, preserved on round-trip
    pub extras: Mapping,
}

impl Task {
    /// Build a task view from a parsed record.
    pub fn from_record(name: impl Into<String>, record: Record) -> Self {
        let mut fields = record.fields;
        Self {
            name: name.into(),
            source: record::take_string(&mut fields, "source"),
            triggered_by: record::take_string(&mut fields, "triggered_by"),
            queued_at: record::take_timestamp(&mut fields, "queued_at"),
            started_at: record::take_timestamp(&mut fields, "started_at"),
            finished_at: record::take_timestamp(&mut fields, "finished_at"),
            status: record::take_string(&mut fields, "status")
                .as_deref()
                .and_then(TaskStatus::parse),
            duration_seconds: record::take_f64(&mut fields, "duration_seconds"),
            exit_code: record::take_i64(&mut fields, "exit_code").map(|v| v as i32),
            result: record::take_string(&mut fields, "result"),
            body: record.body,
            extras: fields,
        }
    }
}

/// Generate a task file name: lexical order equals chronological order, and
/// the source job stays readable in listings.
pub fn task_file_name(queued_at: DateTime<Utc>, job_name: &str) -> String {
    format!("{}--{}", queued_at.format("%Y%m%d-%H%M%S"), job_name)
}
