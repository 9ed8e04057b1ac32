//! Stale temp file sweeping.
//!
//! Temp outputs left behind by a crashed run are recognized by name
//! (`<name>.<pid>-<millis>.tmp`) and age. The sweep is best effort: failures
//! are logged and never fail a run.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Temp files older than this are considered abandoned.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Files removed (or not) by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: usize,
}

/// Whether a file name has the temp output shape.
pub fn is_temp_output_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".tmp") else {
        return false;
    };
    let Some((base, tag)) = stem.rsplit_once('.') else {
        return false;
    };
    let Some((pid, millis)) = tag.split_once('-') else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    !base.is_empty() && all_digits(pid) && all_digits(millis)
}

/// Remove temp outputs in `dir` whose mtime is older than `max_age`.
pub async fn sweep_stale_temp_files(dir: &Path, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "temp sweep: cannot read directory");
            return report;
        }
    };

    let now = SystemTime::now();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "temp sweep: directory iteration failed");
                break;
            }
        };

        let name = entry.file_name();
        if !is_temp_output_name(&name.to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "temp sweep: no mtime");
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "removed stale temp output");
                report.removed.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "temp sweep: removal failed");
                report.failed += 1;
            }
        }
    }

    report
}
