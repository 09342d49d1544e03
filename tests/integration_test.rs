//! Integration tests for Vigil
//!
//! These tests drive the whole pipeline through the library APIs:
//! a jobs directory feeds the trigger evaluator, the evaluator writes task
//! records into the queue, and the processor executes them through a real
//! subprocess backend and archives the outcome.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use vigil_core::{
    AgentCli, AgentCliConfig, Job, JobStore, PassLock, Processor, QueueStore, Record, Scheduler,
    Task, TaskStatus,
};
use vigil_vault::{VaultError, VaultRead};

struct StubVault {
    mtimes: Mutex<HashMap<String, i64>>,
}

impl StubVault {
    fn new() -> Self {
        Self {
            mtimes: Mutex::new(HashMap::new()),
        }
    }

    fn set_mtime(&self, path: &str, mtime: i64) {
        self.mtimes.lock().unwrap().insert(path.to_string(), mtime);
    }
}

#[async_trait]
impl VaultRead for StubVault {
    async fn read(&self, path: &str) -> vigil_vault::Result<String> {
        Err(VaultError::Status {
            status: 404,
            path: path.to_string(),
        })
    }

    async fn read_property(&self, _name: &str, path: &str) -> vigil_vault::Result<String> {
        Err(VaultError::Status {
            status: 404,
            path: path.to_string(),
        })
    }

    async fn list_files(&self, _folder: &str) -> vigil_vault::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn mtime(&self, path: &str) -> vigil_vault::Result<i64> {
        self.mtimes
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or(VaultError::Status {
                status: 404,
                path: path.to_string(),
            })
    }

    async fn is_available(&self) -> bool {
        true
    }
}

struct Pipeline {
    jobs: JobStore,
    queue: QueueStore,
    scheduler: Scheduler,
    vault: Arc<StubVault>,
    dir: TempDir,
}

fn pipeline() -> Pipeline {
    let dir = TempDir::new().unwrap();
    let jobs_dir = dir.path().join("jobs.d");
    fs::create_dir_all(&jobs_dir).unwrap();

    let jobs = JobStore::new(&jobs_dir);
    let queue = QueueStore::new(dir.path().join("queue")).unwrap();
    let vault = Arc::new(StubVault::new());
    let scheduler = Scheduler::new(
        jobs.clone(),
        queue.clone(),
        vault.clone(),
        dir.path().join(".vigil").join("mtimes.json"),
    );

    Pipeline {
        jobs,
        queue,
        scheduler,
        vault,
        dir,
    }
}

/// A processor whose "agent" is `sh -c 'echo ...'`.
fn echo_processor(p: &Pipeline, script: &str) -> Processor {
    let config = AgentCliConfig::new("sh").with_args(vec!["-c".into(), script.into()]);
    Processor::new(
        p.queue.clone(),
        p.jobs.clone(),
        Arc::new(AgentCli::new(config)),
    )
}

fn load_job(p: &Pipeline, name: &str) -> Job {
    Job::from_record(name, Record::load(&p.jobs.path(name)).unwrap())
}

fn archived_tasks(p: &Pipeline) -> Vec<Task> {
    let done = p.dir.path().join("queue").join("done");
    let mut names: Vec<String> = fs::read_dir(&done)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let record = Record::load(&done.join(&name)).unwrap();
            Task::from_record(name, record)
        })
        .collect()
}

#[tokio::test]
async fn test_cron_job_flows_from_definition_to_archive() {
    let p = pipeline();
    fs::write(
        p.jobs.path("daily.md"),
        "---\nschedule: \"0 9 * * *\"\n---\nSummarize yesterday.\n",
    )
    .unwrap();

    let nine = Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 30).unwrap();
    let summary = p.scheduler.pass(nine).await.unwrap();
    assert_eq!(summary.enqueued, 1);

    let outcome = echo_processor(&p, "echo ran")
        .process_next()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Done);

    let tasks = archived_tasks(&p);
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.status, Some(TaskStatus::Done));
    assert_eq!(task.exit_code, Some(0));
    assert_eq!(task.result.as_deref(), Some("ran"));
    assert_eq!(task.source.as_deref(), Some("daily.md"));
    assert_eq!(task.triggered_by.as_deref(), Some("schedule: 0 9 * * *"));

    let job = load_job(&p, "daily.md");
    assert_eq!(job.last_status.as_deref(), Some("done"));
    assert!(job.last_run.is_some());
}

#[tokio::test]
async fn test_watch_job_fires_only_on_change() {
    let p = pipeline();
    fs::write(
        p.jobs.path("inbox.md"),
        "---\nwatch: notes/inbox.md\n---\nTriage the inbox.\n",
    )
    .unwrap();
    p.vault.set_mtime("notes/inbox.md", 1_000);

    // First pass seeds, second sees no change.
    assert_eq!(p.scheduler.pass(Utc::now()).await.unwrap().enqueued, 0);
    assert_eq!(p.scheduler.pass(Utc::now()).await.unwrap().enqueued, 0);

    // A change fires exactly one task.
    p.vault.set_mtime("notes/inbox.md", 2_000);
    assert_eq!(p.scheduler.pass(Utc::now()).await.unwrap().enqueued, 1);

    let outcome = echo_processor(&p, "echo triaged")
        .process_next()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Done);
    assert_eq!(load_job(&p, "inbox.md").last_status.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_failed_execution_is_recorded_not_hidden() {
    let p = pipeline();
    fs::write(
        p.jobs.path("fragile.md"),
        "---\nschedule: \"* * * * *\"\n---\nBreak.\n",
    )
    .unwrap();

    p.scheduler
        .pass(Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap())
        .await
        .unwrap();

    let outcome = echo_processor(&p, "echo boom >&2; exit 7")
        .process_next()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, TaskStatus::Error);
    assert_eq!(outcome.exit_code, 7);

    let tasks = archived_tasks(&p);
    assert_eq!(tasks[0].status, Some(TaskStatus::Error));
    assert_eq!(tasks[0].exit_code, Some(7));
    assert_eq!(tasks[0].result.as_deref(), Some("boom\n"));
    assert_eq!(
        load_job(&p, "fragile.md").last_status.as_deref(),
        Some("error")
    );
}

#[tokio::test]
async fn test_pass_lock_serializes_invocations() {
    let p = pipeline();
    let lock_path = p.dir.path().join(".vigil").join("pass.lock");

    let held = PassLock::acquire(&lock_path).unwrap();
    assert!(PassLock::acquire(&lock_path).is_err());
    drop(held);
    assert!(PassLock::acquire(&lock_path).is_ok());
}

#[tokio::test]
async fn test_processor_survives_restart_between_passes() {
    // Two queued tasks, two independent processor instances: the second
    // instance picks up where the first left off.
    let p = pipeline();
    fs::write(p.jobs.path("a.md"), "---\nschedule: \"* * * * *\"\n---\nA\n").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    fs::write(p.jobs.path("b.md"), "---\nschedule: \"* * * * *\"\n---\nB\n").unwrap();

    p.scheduler
        .pass(Utc.with_ymd_and_hms(2026, 8, 7, 15, 0, 0).unwrap())
        .await
        .unwrap();

    echo_processor(&p, "echo one")
        .process_next()
        .await
        .unwrap()
        .unwrap();
    echo_processor(&p, "echo two")
        .process_next()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(archived_tasks(&p).len(), 2);
    assert!(echo_processor(&p, "echo three")
        .process_next()
        .await
        .unwrap()
        .is_none());
}

#[test]
fn test_stores_are_cheap_to_clone() {
    let dir = TempDir::new().unwrap();
    let jobs = JobStore::new(dir.path());
    let cloned = jobs.clone();
    assert_eq!(jobs.dir(), cloned.dir());
    assert_eq!(jobs.dir(), dir.path());
}
