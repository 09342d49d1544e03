//! Vigil Core - Trigger Evaluation and Task Lifecycle Engine
//!
//! This crate implements the scheduling core of Vigil:
//! - Cron: 5-field cron expression matching
//! - Records: the header-plus-body file format jobs and tasks live in
//! - Tracker: persisted last-seen mtimes for change detection
//! - Scheduler: the dual-trigger evaluation pass (cron + watch)
//! - Queue: the durable task store and the single-worker processor
//! - Executor: the agent CLI subprocess backend
//!
//! The evaluator and the processor are decoupled batch passes that share
//! nothing but the queue directory, so they can be driven independently and
//! survive restarts; crash-safety comes from task state living in the task's
//! own record.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cron;
pub mod error;
pub mod executor;
pub mod job;
pub mod lock;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod task;
pub mod tracker;

pub use cron::CronExpr;
pub use error::{Error, Result};
pub use executor::{AgentCli, AgentCliConfig, ExecOutput, ExecutionBackend};
pub use job::{Job, JobStore};
pub use lock::PassLock;
pub use queue::{ProcessOutcome, Processor, QueueStore};
pub use record::Record;
pub use scheduler::{PassSummary, Scheduler, SkipReason, TriggerDecision};
pub use task::{Task, TaskStatus};
pub use tracker::MtimeTracker;
