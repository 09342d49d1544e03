//! Filesystem-backed task queue partitions

use chrono::{DateTime, Utc};
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

use crate::error::Result;
use crate::job::Job;
use crate::record::{self, Record};
use crate::task::{self, Task, TaskStatus};

/// The queue directory and its `done/` archive partition.
#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
    done_dir: PathBuf,
}

impl QueueStore {
    /// Open the queue, creating both partitions if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let done_dir = dir.join("done");
        fs::create_dir_all(&done_dir)?;
        Ok(Self { dir, done_dir })
    }

    /// Path of an active task record.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Path of an archived task record.
    pub fn done_path(&self, name: &str) -> PathBuf {
        self.done_dir.join(name)
    }

    /// Materialize a job as a queued task. The job's body is copied
    /// verbatim; the job's own fields are left untouched.
    pub fn enqueue(&self, job: &Job, triggered_by: &str, now: DateTime<Utc>) -> Result<String> {
        // Same job, same second (e.g. two watched resources in one pass):
        // disambiguate instead of clobbering the earlier record.
        let mut name = task::task_file_name(now, &job.name);
        let mut counter = 1;
        while self.path(&name).exists() {
            name = format!("{}-{counter}--{}", now.format("%Y%m%d-%H%M%S"), job.name);
            counter += 1;
        }

        let mut record = Record::new();
        record.set("source", job.name.as_str().into());
        record.set("triggered_by", triggered_by.into());
        record.set("queued_at", record::format_timestamp(now).into());
        record.set("status", TaskStatus::Queued.as_str().into());
        record.body = job.body.clone();

        record.store(&self.path(&name))?;
        Ok(name)
    }

    /// Select the oldest queued task, or `None` when the queue is empty.
    ///
    /// Records with no status field at all count as queued (they predate
    /// status tagging); anything else is another lifecycle state and is
    /// never selected again. Ordering is creation time with the record name
    /// as tiebreaker.
    pub fn next_queued(&self) -> Result<Option<Task>> {
        let mut candidates: Vec<(SystemTime, String)> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !entry.file_name().to_string_lossy().ends_with(".md") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();

            let record = match Record::load(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(task = %name, error = %e, "skipping unreadable task");
                    continue;
                }
            };

            let queued = match record.fields.get("status") {
                None => true,
                Some(value) => value.as_str() == Some(TaskStatus::Queued.as_str()),
            };
            if !queued {
                continue;
            }

            let created = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((created, name));
        }

        candidates.sort();
        let Some((_, name)) = candidates.into_iter().next() else {
            return Ok(None);
        };

        let record = Record::load(&self.path(&name))?;
        Ok(Some(Task::from_record(name, record)))
    }

    /// Read-merge-write field updates onto an active task record.
    pub fn update(&self, name: &str, updates: Mapping) -> Result<()> {
        record::update_fields(&self.path(name), updates)
    }

    /// Relocate a task record into the archive partition. After this the
    /// record is immutable and excluded from selection.
    pub fn archive(&self, name: &str) -> Result<()> {
        fs::rename(self.path(name), self.done_path(name))?;
        Ok(())
    }

    /// Active partition directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job_named(name: &str, body: &str) -> Job {
        let mut record = Record::new();
        record.body = body.to_string();
        Job::from_record(name, record)
    }

    #[test]
    fn test_enqueue_writes_a_queued_record() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();
        let now = Utc::now();

        let name = store
            .enqueue(&job_named("report.md", "Write it.\n"), "schedule: 0 9 * * *", now)
            .unwrap();
        assert!(name.ends_with("--report.md"));

        let task = store.next_queued().unwrap().unwrap();
        assert_eq!(task.name, name);
        assert_eq!(task.source.as_deref(), Some("report.md"));
        assert_eq!(task.triggered_by.as_deref(), Some("schedule: 0 9 * * *"));
        assert_eq!(task.status, Some(TaskStatus::Queued));
        assert_eq!(task.body, "Write it.\n");
    }

    #[test]
    fn test_next_queued_picks_oldest() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();

        let t0 = Utc::now();
        store.enqueue(&job_named("first.md", "a"), "watch: x", t0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        store
            .enqueue(&job_named("second.md", "b"), "watch: y", t0 + chrono::Duration::seconds(1))
            .unwrap();

        let task = store.next_queued().unwrap().unwrap();
        assert_eq!(task.source.as_deref(), Some("first.md"));
    }

    #[test]
    fn test_non_queued_records_are_not_selected() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();

        for (name, status) in [("a.md", "running"), ("b.md", "done"), ("c.md", "error")] {
            fs::write(
                store.path(name),
                format!("---\nstatus: {status}\n---\nbody"),
            )
            .unwrap();
        }
        assert!(store.next_queued().unwrap().is_none());
    }

    #[test]
    fn test_record_without_status_counts_as_queued() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();

        fs::write(store.path("legacy.md"), "just a body, no header").unwrap();
        let task = store.next_queued().unwrap().unwrap();
        assert_eq!(task.name, "legacy.md");
    }

    #[test]
    fn test_archive_moves_out_of_selection() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();

        let name = store
            .enqueue(&job_named("job.md", "x"), "watch: p", Utc::now())
            .unwrap();
        store.archive(&name).unwrap();

        assert!(store.next_queued().unwrap().is_none());
        assert!(!store.path(&name).exists());
        assert!(store.done_path(&name).is_file());
    }

    #[test]
    fn test_same_second_enqueues_do_not_clobber() {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();
        let job = job_named("watcher.md", "x");
        let now = Utc::now();

        let first = store.enqueue(&job, "watch: a", now).unwrap();
        let second = store.enqueue(&job, "watch: b", now).unwrap();
        assert_ne!(first, second);
        assert!(store.path(&first).is_file());
        assert!(store.path(&second).is_file());
    }

    #[test]
    fn test_archived_records_are_ignored_even_if_queued() {
        // A queued-looking record inside done/ must never be picked up.
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(dir.path().join("queue")).unwrap();

        fs::write(store.done_path("old.md"), "---\nstatus: queued\n---\n").unwrap();
        assert!(store.next_queued().unwrap().is_none());
    }
}
