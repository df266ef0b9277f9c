//! Job workspace management: one isolated directory per conversion job.
//!
//! The filesystem namespace, partitioned by job identifier, is the service's
//! only shared mutable state and its only concurrency-safety mechanism. That
//! holds as long as identifiers are never reused, which is why [`JobId`] is a
//! freshly generated 128-bit UUID — collision resistance is a strict
//! invariant here, not a nicety.
//!
//! [`WorkspaceManager`] exclusively owns the lifetime of every job directory.
//! Other components only ever touch paths it handed out for a specific job.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque unique job identifier: a v4 UUID in canonical hyphenated form.
///
/// Filesystem-safe by construction (hex digits and hyphens only), so it is
/// used directly as the job's directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh identifier. Never reused across jobs.
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for JobId {
    type Err = ConvertError;

    /// Parsing doubles as validation: a route parameter that is not a UUID
    /// can never name a directory, so it is rejected before any path is
    /// built from it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(JobId)
            .map_err(|_| ConvertError::InvalidParameter("Invalid job_id format".into()))
    }
}

/// Allocates, resolves, lists, and deletes per-job workspace directories.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create a manager rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ConvertError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ConvertError::io(&root, e))?;
        Ok(Self { root })
    }

    /// The directory holding one subdirectory per job.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// Allocate a new job: fresh identifier, fresh empty exclusive directory.
    pub async fn create(&self) -> Result<(JobId, PathBuf), ConvertError> {
        let job_id = JobId::new();
        let dir = self.job_dir(&job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConvertError::io(&dir, e))?;
        debug!(%job_id, "Created job workspace");
        Ok((job_id, dir))
    }

    /// Resolve `(job_id, filename)` to the concrete file inside the job's
    /// directory.
    ///
    /// The traversal check is mandatory: empty names, path separators, `..`,
    /// and absolute paths are all rejected. The caller-facing error is the
    /// same `NotFound` as for a genuinely missing file; only the log records
    /// the difference.
    pub async fn resolve(&self, job_id: &JobId, filename: &str) -> Result<PathBuf, ConvertError> {
        if !is_safe_filename(filename) {
            warn!(%job_id, filename, "Rejected unsafe filename in resolve");
            return Err(ConvertError::NotFound);
        }

        let dir = self.job_dir(job_id);
        let path = dir.join(filename);
        // Belt and braces: with separators rejected the join cannot escape,
        // but the invariant is cheap to assert.
        if !path.starts_with(&dir) {
            warn!(%job_id, filename, "Resolved path escaped job directory");
            return Err(ConvertError::NotFound);
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ConvertError::NotFound),
        }
    }

    /// List filenames currently present in the job's workspace, sorted.
    pub async fn list(&self, job_id: &JobId) -> Result<Vec<String>, ConvertError> {
        let dir = self.job_dir(job_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Err(ConvertError::NotFound),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConvertError::io(&dir, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Recursively remove the job's directory.
    ///
    /// Returns `Ok(true)` if the workspace existed and was removed,
    /// `Ok(false)` if it was already gone — deletion is idempotent, and the
    /// caller chooses whether "already gone" matters.
    pub async fn delete(&self, job_id: &JobId) -> Result<bool, ConvertError> {
        let dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(%job_id, "Deleted job workspace");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConvertError::io(&dir, e)),
        }
    }
}

/// A filename is safe when it cannot name anything outside its job
/// directory: non-empty, no separators, no parent references, not absolute.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && !Path::new(filename).is_absolute()
}
