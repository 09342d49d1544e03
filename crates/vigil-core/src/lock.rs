//! Advisory pass lock
//!
//! The evaluator and processor assume at most one pass runs at a time. That
//! single-instance invariant is made explicit: every pass acquires the lock
//! file for its duration and fails fast when it is already held. The lock is
//! released when the guard drops.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Guard over the lock file; the lock is held until the guard drops.
#[derive(Debug)]
pub struct PassLock {
    path: PathBuf,
}

impl PassLock {
    /// Acquire the lock, failing fast with [`Error::LockHeld`] when another
    /// pass holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::LockHeld(path));
            }
            Err(e) => return Err(e.into()),
        };

        // Best-effort owner hint for whoever finds a stale lock
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release pass lock");
        }
    }
}

impl PassLock {
    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pass.lock");

        let lock = PassLock::acquire(&path).unwrap();
        assert!(path.is_file());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_fails_fast() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pass.lock");

        let _held = PassLock::acquire(&path).unwrap();
        assert!(matches!(
            PassLock::acquire(&path),
            Err(Error::LockHeld(_))
        ));
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pass.lock");

        drop(PassLock::acquire(&path).unwrap());
        assert!(PassLock::acquire(&path).is_ok());
    }
}
