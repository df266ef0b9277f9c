//! Job lifecycle: on-demand cleanup and retention-based purge.
//!
//! Two independent paths destroy a job's resources: the explicit
//! `DELETE /cleanup/{job_id}` call, and the background sweep that purges
//! workspaces older than the retention threshold. The sweep runs safely
//! alongside in-flight conversions for other jobs because eligibility
//! requires an age far beyond any single conversion's duration — a
//! workspace still mid-write is always younger than the threshold.

use crate::error::ConvertError;
use crate::workspace::{JobId, WorkspaceManager};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delete a single job's workspace immediately.
///
/// Returns `Ok(true)` when the job existed, `Ok(false)` when it was already
/// gone; the HTTP layer reports the latter as not-found.
pub async fn cleanup(
    workspaces: &WorkspaceManager,
    job_id: &JobId,
) -> Result<bool, ConvertError> {
    let removed = workspaces.delete(job_id).await?;
    if removed {
        info!(%job_id, "Job cleaned up");
    }
    Ok(removed)
}

/// Delete every job workspace older than `retention`, by directory
/// modification time. Returns how many were removed.
///
/// Individual entries that cannot be inspected or removed are logged and
/// skipped; one bad directory must not stall the purge of the rest.
pub async fn sweep(
    workspaces: &WorkspaceManager,
    retention: Duration,
) -> Result<usize, ConvertError> {
    let root = workspaces.root().to_path_buf();
    let mut entries = tokio::fs::read_dir(&root)
        .await
        .map_err(|e| ConvertError::io(&root, e))?;

    let now = SystemTime::now();
    let mut removed = 0usize;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::io(&root, e))?
    {
        let path = entry.path();
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Sweep could not stat entry");
                continue;
            }
        };
        if !meta.is_dir() {
            continue;
        }

        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        match age {
            Some(age) if age > retention => {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => {
                        info!(path = %path.display(), age_secs = age.as_secs(), "Purged expired job");
                        removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Sweep could not remove workspace");
                    }
                }
            }
            _ => {
                debug!(path = %path.display(), "Job within retention, kept");
            }
        }
    }

    Ok(removed)
}

/// Spawn the background purge loop: one [`sweep`] every `interval`.
///
/// The task runs for the life of the process; sweep errors are logged, never
/// fatal.
pub fn spawn_periodic_sweep(
    workspaces: WorkspaceManager,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup does not
        // race freshly created workspaces in short-retention deployments.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep(&workspaces, retention).await {
                Ok(0) => debug!("Sweep found nothing to purge"),
                Ok(n) => info!(purged = n, "Sweep purged expired jobs"),
                Err(e) => warn!(error = %e, "Sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, WorkspaceManager) {
        let tmp = TempDir::new().unwrap();
        let mgr = WorkspaceManager::new(tmp.path()).unwrap();
        (tmp, mgr)
    }

    #[tokio::test]
    async fn cleanup_acks_and_reports_already_gone() {
        let (_tmp, mgr) = manager();
        let (id, dir) = mgr.create().await.unwrap();
        std::fs::write(dir.join("page-1.png"), b"x").unwrap();

        assert!(cleanup(&mgr, &id).await.unwrap());
        assert!(!cleanup(&mgr, &id).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_purges_only_expired_workspaces() {
        let (tmp, mgr) = manager();
        let (_old, old_dir) = mgr.create().await.unwrap();
        std::fs::write(old_dir.join("page-1.png"), b"x").unwrap();

        // Let the first workspace age past a tiny retention, then create a
        // fresh one that must survive.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_young, young_dir) = mgr.create().await.unwrap();

        let removed = sweep(&mgr, Duration::from_millis(20)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!old_dir.exists());
        assert!(young_dir.exists());

        // Everything is eligible once retention is far in the past.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sweep(&mgr, Duration::ZERO).await.unwrap(), 1);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn sweep_ignores_stray_files_in_root() {
        let (tmp, mgr) = manager();
        std::fs::write(tmp.path().join("stray.txt"), b"not a job").unwrap();

        assert_eq!(sweep(&mgr, Duration::ZERO).await.unwrap(), 0);
        assert!(tmp.path().join("stray.txt").exists());
    }
}
