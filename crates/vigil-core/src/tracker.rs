//! Change tracker: last-seen modification timestamps
//!
//! One JSON table keyed by `"<job>:<resource>"`, loaded wholesale at the
//! start of an evaluation pass and flushed wholesale at the end. A missing
//! table file means first run: every pair observed in that pass is seeded
//! but must not fire. The tracker is injected into the scheduler per pass;
//! there is no process-wide instance.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

/// Persistent (job, resource) → mtime table.
#[derive(Debug)]
pub struct MtimeTracker {
    path: PathBuf,
    table: BTreeMap<String, i64>,
    first_run: bool,
}

impl MtimeTracker {
    /// Load the table, or start empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (table, first_run) = if path.is_file() {
            (serde_json::from_str(&fs::read_to_string(&path)?)?, false)
        } else {
            (BTreeMap::new(), true)
        };
        Ok(Self {
            path,
            table,
            first_run,
        })
    }

    /// True when no table existed before this pass.
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Last observed mtime for a (job, resource) pair.
    pub fn get(&self, job: &str, resource: &str) -> Option<i64> {
        self.table.get(&key(job, resource)).copied()
    }

    /// Record the freshly observed mtime for a (job, resource) pair.
    pub fn set(&mut self, job: &str, resource: &str, mtime: i64) {
        self.table.insert(key(job, resource), mtime);
    }

    /// Persist the whole table atomically (temp file + rename); a reader
    /// never observes a partially written table.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "mtimes.json".to_string());
        let tmp = self.path.with_file_name(format!(".{name}.tmp"));
        fs::write(&tmp, serde_json::to_string(&self.table)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn key(job: &str, resource: &str) -> String {
    format!("{job}:{resource}")
}
