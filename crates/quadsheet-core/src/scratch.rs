//! Scoped temporary artifacts
//!
//! Every intermediate file (merged input, isolated single page, rasterizer
//! output) is owned by the scope that created it and removed when that scope
//! ends, on success and error paths alike. Removals that fail are handed to
//! the deferred cleanup task.

use crate::cleanup::{self, CleanupPolicy};
use crate::error::LayoutError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};

const PREFIX: &str = "quadsheet-";

/// Factory for uniquely named scratch files in one directory
#[derive(Debug, Clone)]
pub struct Scratch {
    dir: PathBuf,
    policy: CleanupPolicy,
}

impl Scratch {
    /// Use `dir`, or the system temp directory when `None`
    pub fn new(dir: Option<PathBuf>, policy: CleanupPolicy) -> Self {
        Self {
            dir: dir.unwrap_or_else(std::env::temp_dir),
            policy,
        }
    }

    /// Write `bytes` to a fresh `.pdf` scratch file and release the handle
    pub fn pdf_with_bytes(&self, label: &str, bytes: &[u8]) -> Result<ScratchFile, LayoutError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}{}-", PREFIX, label))
            .suffix(".pdf")
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        // Close our handle so external readers see a finished file
        let path = file.into_temp_path();
        tracing::trace!("Created scratch file {}", path.display());

        Ok(ScratchFile {
            path: Some(path),
            policy: self.policy,
        })
    }

    /// Create an empty scratch directory
    pub fn subdir(&self, label: &str) -> Result<ScratchDir, LayoutError> {
        std::fs::create_dir_all(&self.dir)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", PREFIX, label))
            .tempdir_in(&self.dir)?;
        Ok(ScratchDir {
            dir: Some(dir),
            policy: self.policy,
        })
    }
}

/// A scratch file removed on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<TempPath>,
    policy: CleanupPolicy,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        // Only `None` while dropping
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let owned = path.to_path_buf();
            if let Err(e) = path.close() {
                defer_removal(owned, self.policy, e);
            }
        }
    }
}

/// A scratch directory removed, with its contents, on drop
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    policy: CleanupPolicy,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let owned = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                defer_removal(owned, self.policy, e);
            }
        }
    }
}

fn defer_removal(path: PathBuf, policy: CleanupPolicy, error: std::io::Error) {
    if !path.exists() {
        return;
    }
    tracing::warn!(
        "Could not remove {} ({}), retrying in the background",
        path.display(),
        error
    );
    // Detached: the task logs its own outcome
    let _ = cleanup::schedule_removal(path, policy);
}
