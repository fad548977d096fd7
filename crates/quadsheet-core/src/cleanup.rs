//! Removal of files that may still be held open by someone else
//!
//! Removal is retried with exponential backoff. When the caller cannot wait,
//! [`schedule_removal`] hands the path to a short-lived background thread
//! that waits out a grace period first.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Delay before a deferred removal starts
    pub grace_ms: u64,
    /// Removal attempts before giving up
    pub attempts: u32,
    /// Initial delay between attempts, doubled after each failure
    pub backoff_ms: u64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            attempts: 5,
            backoff_ms: 100,
        }
    }
}

impl CleanupPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1 << attempt.min(16)))
    }
}

/// Remove a file or directory tree. A path that is already gone counts as removed.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove `path`, retrying with backoff while the removal keeps failing
pub fn remove_with_retry(path: &Path, policy: &CleanupPolicy) -> io::Result<()> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match remove_path(path) {
            Ok(()) => return Ok(()),
            Err(e) if attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                tracing::debug!(
                    "Removal of {} failed (attempt {}): {}",
                    path.display(),
                    attempt + 1,
                    e
                );
                thread::sleep(policy.delay_before(attempt));
                attempt += 1;
            }
        }
    }
}

/// Remove `path` in the background after the grace period
///
/// The handle yields whether the path is gone. Dropping it detaches the task.
pub fn schedule_removal(path: PathBuf, policy: CleanupPolicy) -> Option<JoinHandle<bool>> {
    let spawned = thread::Builder::new()
        .name("quadsheet-cleanup".into())
        .spawn(move || {
            thread::sleep(Duration::from_millis(policy.grace_ms));
            match remove_with_retry(&path, &policy) {
                Ok(()) => {
                    tracing::debug!("Deferred removal of {} done", path.display());
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        "Giving up on removing {} after {} attempts: {}",
                        path.display(),
                        policy.attempts,
                        e
                    );
                    false
                }
            }
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Could not start cleanup task: {}", e);
            None
        }
    }
}
