//! Periodic removal of stale artifacts from the downloads directory.
//!
//! Artifacts are normally deleted shortly after being transferred; this job
//! catches the ones that were never fetched.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub struct DownloadsSweepJob {
    /// Files older than this are removed.
    retention: Duration,
    interval: Duration,
}

impl DownloadsSweepJob {
    pub fn new(retention: Duration, interval: Duration) -> Self {
        Self {
            retention,
            interval,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub deleted: usize,
    pub errors: usize,
}

fn file_age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or_default())
}

/// Deletes regular files in `dir` older than `retention`.
pub fn sweep_directory(
    dir: &Path,
    retention: Duration,
    ctx: &JobContext,
) -> Result<SweepStats, JobError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        JobError::ExecutionFailed(format!("Failed to read {}: {}", dir.display(), e))
    })?;

    let now = SystemTime::now();
    let mut stats = SweepStats::default();

    for entry in entries.flatten() {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        stats.scanned += 1;

        let Some(age) = file_age(&path, now) else {
            stats.errors += 1;
            continue;
        };
        if age <= retention {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale artifact {}", path.display());
                stats.deleted += 1;
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

impl BackgroundJob for DownloadsSweepJob {
    fn id(&self) -> &'static str {
        "downloads_sweep"
    }

    fn name(&self) -> &'static str {
        "Downloads Sweep"
    }

    fn description(&self) -> &'static str {
        "Removes converted files that outlived the retention window"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if !ctx.downloads_dir.exists() {
            debug!(
                "Downloads directory does not exist: {:?}",
                ctx.downloads_dir
            );
            return Ok(());
        }

        let stats = sweep_directory(&ctx.downloads_dir, self.retention, ctx)?;
        if stats.deleted > 0 || stats.errors > 0 {
            info!(
                "Downloads sweep: scanned {}, deleted {}, errors {}",
                stats.scanned, stats.deleted, stats.errors
            );
        }
        Ok(())
    }
}
