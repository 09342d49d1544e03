//! Job definitions and the jobs directory
//!
//! A job is a record file describing recurring or reactive work: an optional
//! cron `schedule`, an optional `watch` list of vault paths with `match` /
//! `match_property` filters, and outcome fields (`last_run`, `last_status`)
//! that only the queue processor writes. Jobs are created and edited by
//! external actors; this system never deletes them.

use chrono::{DateTime, Utc};
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::record::{self, Record};

/// A parsed job definition.
#[derive(Debug, Clone)]
pub struct Job {
    /// Job identity: the record's file name
    pub name: String,
    /// Disabled jobs are skipped entirely; missing means enabled
    pub enabled: bool,
    /// Cron expression for the time-based trigger path
    pub schedule: Option<String>,
    /// Vault paths for the change-based trigger path
    pub watch: Vec<String>,
    /// Regex the watched resource's content must match (`match` field)
    pub match_pattern: Option<String>,
    /// `name=expected` property filter on the watched resource
    pub match_property: Option<String>,
    /// When the job's last task finished
    pub last_run: Option<DateTime<Utc>>,
    /// Terminal status of the job's last task
    pub last_status: Option<String>,
    /// Prompt payload, copied verbatim into each task
    pub body: String,
    /// Unrecognized header fields, preserved on round-trip
    pub extras: Mapping,
}

impl Job {
    /// Build a job view from a parsed record.
    pub fn from_record(name: impl Into<String>, record: Record) -> Self {
        let mut fields = record.fields;
        Self {
            name: name.into(),
            enabled: record::take_bool(&mut fields, "enabled").unwrap_or(true),
            schedule: record::take_string(&mut fields, "schedule"),
            watch: record::take_string_list(&mut fields, "watch"),
            match_pattern: record::take_string(&mut fields, "match"),
            match_property: record::take_string(&mut fields, "match_property"),
            last_run: record::take_timestamp(&mut fields, "last_run"),
            last_status: record::take_string(&mut fields, "last_status"),
            body: record.body,
            extras: fields,
        }
    }

    /// A job with neither trigger path configured never fires.
    pub fn has_trigger(&self) -> bool {
        self.schedule.is_some() || !self.watch.is_empty()
    }
}

/// The jobs directory.
#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Create a store over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Jobs directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a job record by name.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Whether a job record currently exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// List all jobs, sorted by name. A missing directory yields an empty
    /// list; a job that fails to parse is logged and skipped so one bad
    /// record cannot abort a pass.
    pub fn list(&self) -> Result<Vec<Job>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".md"))
            .collect();
        names.sort();

        let mut jobs = Vec::with_capacity(names.len());
        for name in names {
            match Record::load(&self.path(&name)) {
                Ok(record) => jobs.push(Job::from_record(&name, record)),
                Err(e) => warn!(job = %name, error = %e, "skipping unreadable job"),
            }
        }
        Ok(jobs)
    }

    /// Record a finished task's outcome on its source job.
    pub fn record_outcome(
        &self,
        name: &str,
        finished_at: DateTime<Utc>,
        status: &str,
    ) -> Result<()> {
        let mut updates = Mapping::new();
        updates.insert(
            "last_run".into(),
            record::format_timestamp(finished_at).into(),
        );
        updates.insert("last_status".into(), status.into());
        record::update_fields(&self.path(name), updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_job(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_job_defaults() {
        let record = Record::parse("Run the nightly report.\n").unwrap();
        let job = Job::from_record("report.md", record);
        assert!(job.enabled);
        assert!(job.schedule.is_none());
        assert!(job.watch.is_empty());
        assert!(!job.has_trigger());
        assert_eq!(job.body, "Run the nightly report.\n");
    }

    #[test]
    fn test_job_with_schedule_and_watch_list() {
        let text = "---\nschedule: \"0 9 * * 1-5\"\nwatch:\n  - notes/inbox.md\n  - notes/todo.md\nmatch: urgent\n---\nTriage.\n";
        let job = Job::from_record("triage.md", Record::parse(text).unwrap());
        assert_eq!(job.schedule.as_deref(), Some("0 9 * * 1-5"));
        assert_eq!(job.watch, vec!["notes/inbox.md", "notes/todo.md"]);
        assert_eq!(job.match_pattern.as_deref(), Some("urgent"));
        assert!(job.has_trigger());
    }

    #[test]
    fn test_job_single_watch_string() {
        let text = "---\nwatch: notes/inbox.md\n---\n";
        let job = Job::from_record("watcher.md", Record::parse(text).unwrap());
        assert_eq!(job.watch, vec!["notes/inbox.md"]);
    }

    #[test]
    fn test_disabled_job() {
        let text = "---\nenabled: false\nschedule: \"* * * * *\"\n---\n";
        let job = Job::from_record("off.md", Record::parse(text).unwrap());
        assert!(!job.enabled);
    }

    #[test]
    fn test_unknown_fields_land_in_extras() {
        let text = "---\nschedule: \"* * * * *\"\nowner: alice\n---\n";
        let job = Job::from_record("owned.md", Record::parse(text).unwrap());
        assert_eq!(
            job.extras.get("owner").and_then(|v| v.as_str()),
            Some("alice")
        );
        assert!(job.extras.get("schedule").is_none());
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_job(dir.path(), "b.md", "second");
        write_job(dir.path(), "a.md", "first");
        write_job(dir.path(), "notes.txt", "not a job");

        let store = JobStore::new(dir.path());
        let jobs = store.list().unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let store = JobStore::new("/nonexistent/jobs.d");
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_record_outcome_merges_fields() {
        let dir = TempDir::new().unwrap();
        write_job(
            dir.path(),
            "job.md",
            "---\nschedule: \"* * * * *\"\n---\nbody\n",
        );

        let store = JobStore::new(dir.path());
        let finished = Utc::now();
        store.record_outcome("job.md", finished, "done").unwrap();

        let job = Job::from_record("job.md", Record::load(&dir.path().join("job.md")).unwrap());
        assert_eq!(job.schedule.as_deref(), Some("* * * * *"));
        assert_eq!(job.last_status.as_deref(), Some("done"));
        assert_eq!(job.last_run.unwrap().timestamp(), finished.timestamp());
        assert_eq!(job.body, "body\n");
    }
}
