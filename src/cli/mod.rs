//! CLI for Vigil
//!
//! Commands:
//! - `run`: daemon loop driving evaluation and processing on timers
//! - `schedule`: one trigger-evaluation pass
//! - `process`: process the oldest queued task
//! - `validate`: check job definitions for problems

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vigil_core::{
    AgentCli, AgentCliConfig, CronExpr, JobStore, PassLock, Processor, QueueStore, Scheduler,
};
use vigil_vault::VaultClient;

use crate::daemon::Daemon;

/// Vigil scheduler CLI
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "File-backed job scheduler and agent task queue")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub opts: Opts,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Store locations and agent configuration, shared by all commands.
#[derive(Args, Debug)]
pub struct Opts {
    /// Directory of job definitions
    #[arg(long, env = "VIGIL_JOBS_DIR", default_value = "jobs.d", global = true)]
    pub jobs_dir: PathBuf,

    /// Queue directory (the archive lives in its done/ subdirectory)
    #[arg(long, env = "VIGIL_QUEUE_DIR", default_value = "queue", global = true)]
    pub queue_dir: PathBuf,

    /// Directory for scheduler state (mtimes table, pass lock)
    #[arg(long, env = "VIGIL_STATE_DIR", default_value = ".vigil", global = true)]
    pub state_dir: PathBuf,

    /// Agent command tasks are executed with
    #[arg(long, env = "VIGIL_AGENT_CMD", default_value = "claude", global = true)]
    pub agent_cmd: String,

    /// Arguments placed before the prompt
    #[arg(
        long = "agent-arg",
        env = "VIGIL_AGENT_ARGS",
        value_delimiter = ',',
        default_value = "--print",
        allow_hyphen_values = true,
        global = true
    )]
    pub agent_args: Vec<String>,

    /// Hard wall-clock timeout for one execution, in seconds
    #[arg(long, env = "VIGIL_AGENT_TIMEOUT", default_value_t = 300, global = true)]
    pub agent_timeout: u64,

    /// Working directory for the agent process
    #[arg(long, env = "VIGIL_WORKSPACE", global = true)]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon loop (default)
    Run {
        /// Seconds between trigger-evaluation passes
        #[arg(long, env = "VIGIL_SCHEDULE_INTERVAL", default_value_t = 60)]
        schedule_interval: u64,

        /// Seconds between queue-processing passes
        #[arg(long, env = "VIGIL_PROCESS_INTERVAL", default_value_t = 15)]
        process_interval: u64,
    },
    /// Run one trigger-evaluation pass
    Schedule,
    /// Process the oldest queued task
    Process,
    /// Check job definitions for problems
    Validate,
}

/// Run the CLI command.
pub async fn run(cli: Cli) -> Result<()> {
    let opts = cli.opts;
    match cli.command {
        Some(Commands::Schedule) => schedule(&opts).await,
        Some(Commands::Process) => process(&opts).await,
        Some(Commands::Validate) => validate(&opts),
        Some(Commands::Run {
            schedule_interval,
            process_interval,
        }) => serve(&opts, schedule_interval, process_interval).await,
        None => serve(&opts, 60, 15).await,
    }
}

fn lock_path(opts: &Opts) -> PathBuf {
    opts.state_dir.join("pass.lock")
}

fn build_scheduler(opts: &Opts) -> Result<Scheduler> {
    let vault = VaultClient::from_env().context("building vault client")?;
    let queue = QueueStore::new(&opts.queue_dir).context("opening queue directory")?;
    Ok(Scheduler::new(
        JobStore::new(&opts.jobs_dir),
        queue,
        Arc::new(vault),
        opts.state_dir.join("mtimes.json"),
    ))
}

fn build_processor(opts: &Opts) -> Result<Processor> {
    let mut config = AgentCliConfig::new(&opts.agent_cmd)
        .with_args(opts.agent_args.clone())
        .with_timeout(opts.agent_timeout);
    if let Some(workspace) = &opts.workspace {
        config = config.with_workspace(workspace);
    }

    let queue = QueueStore::new(&opts.queue_dir).context("opening queue directory")?;
    Ok(Processor::new(
        queue,
        JobStore::new(&opts.jobs_dir),
        Arc::new(AgentCli::new(config)),
    ))
}

async fn schedule(opts: &Opts) -> Result<()> {
    let _lock = PassLock::acquire(lock_path(opts))?;
    let summary = build_scheduler(opts)?.pass(Utc::now()).await?;
    info!(
        jobs = summary.jobs,
        enqueued = summary.enqueued,
        skipped = summary.skipped,
        errors = summary.errors,
        "evaluation pass finished"
    );
    Ok(())
}

async fn process(opts: &Opts) -> Result<()> {
    let _lock = PassLock::acquire(lock_path(opts))?;
    match build_processor(opts)?.process_next().await? {
        Some(outcome) => info!(
            task = %outcome.task,
            status = %outcome.status,
            exit_code = outcome.exit_code,
            duration_seconds = outcome.duration_seconds,
            "task processed"
        ),
        None => info!("queue is empty"),
    }
    Ok(())
}

fn validate(opts: &Opts) -> Result<()> {
    let jobs = JobStore::new(&opts.jobs_dir).list()?;
    if jobs.is_empty() {
        println!("no jobs in {}", opts.jobs_dir.display());
        return Ok(());
    }

    let mut problems = 0;
    for job in &jobs {
        let mut notes = Vec::new();

        if let Some(expression) = &job.schedule {
            if let Err(e) = CronExpr::parse(expression) {
                notes.push(e.to_string());
            }
        }
        if let Some(pattern) = &job.match_pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                notes.push(format!("invalid match pattern: {e}"));
            }
        }
        if let Some(filter) = &job.match_property {
            if !filter.contains('=') {
                notes.push(format!("match_property '{filter}' needs name=expected"));
            }
        }
        if !job.has_trigger() {
            notes.push("no schedule or watch: never fires".to_string());
        }

        if notes.is_empty() {
            println!("ok      {}", job.name);
        } else {
            problems += 1;
            for note in notes {
                println!("problem {}: {}", job.name, note);
            }
        }
    }

    if problems > 0 {
        bail!("{problems} job(s) with problems");
    }
    Ok(())
}

async fn serve(opts: &Opts, schedule_interval: u64, process_interval: u64) -> Result<()> {
    info!("starting vigil v{}", env!("CARGO_PKG_VERSION"));

    let daemon = Daemon::new(
        build_scheduler(opts)?,
        build_processor(opts)?,
        lock_path(opts),
        Duration::from_secs(schedule_interval),
        Duration::from_secs(process_interval),
    );

    let shutdown = tokio_util::sync::CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            signal.cancel();
        }
    });

    daemon.run(shutdown).await;
    Ok(())
}
