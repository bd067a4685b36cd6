//! Derivative garbage collection.
//!
//! Walks the derivative tree and removes every derivative whose source is
//! gone or now excluded. Freshness is not checked here; a stale derivative
//! with a live source is left for the scan phase to overwrite.
//!
//! Deletion failures are reported and counted but never abort the run.
//! Empty directories left behind are not pruned.
//!
//! Leftover temp files from interrupted encodes are removed once they are
//! older than [`STALE_TEMP_AGE`], so an encode running concurrently in
//! another process keeps its file.
//!
//! The walk stops early when the run's deadline passes; the remaining
//! derivatives are left for the next run.

use crate::exclude::ExclusionFilter;
use crate::imaging::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::paths::{self, PathMapper};
use crate::sync::SyncEvent;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Temp files at least this old are treated as abandoned.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Why a derivative was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    SourceMissing,
    SourceExcluded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcOutcome {
    pub removed: u32,
    pub kept: u32,
    /// Derivatives that should have been removed but could not be.
    pub failures: Vec<(PathBuf, String)>,
    /// Abandoned temp files removed.
    pub temp_removed: u32,
    /// The deadline passed before the walk finished.
    pub timed_out: bool,
}

fn is_temp_file(name: &OsStr) -> bool {
    paths::name_starts_with(name, TEMP_FILE_PREFIX) && paths::name_ends_with(name, TEMP_FILE_SUFFIX)
}

fn is_stale(path: &Path, now: SystemTime) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_TEMP_AGE)
}

/// Decide whether a derivative must go, and why.
fn removal_reason(
    mapper: &PathMapper,
    exclusions: &ExclusionFilter,
    derivative: &Path,
) -> (Option<PathBuf>, Option<RemovalReason>) {
    let Some(original) = mapper.source_path_of(derivative) else {
        return (None, Some(RemovalReason::SourceMissing));
    };
    let reason = if !original.is_file() {
        Some(RemovalReason::SourceMissing)
    } else if exclusions.is_excluded(&original) {
        Some(RemovalReason::SourceExcluded)
    } else {
        None
    };
    (Some(original), reason)
}

/// Remove orphaned and excluded derivatives under the mapper's derivative root.
///
/// No entry is looked at once `deadline` has passed.
pub fn collect_garbage(
    mapper: &PathMapper,
    exclusions: &ExclusionFilter,
    deadline: Option<Instant>,
    events: Option<&Sender<SyncEvent>>,
) -> GcOutcome {
    let mut outcome = GcOutcome::default();
    let root = mapper.derivative_root();
    if !root.is_dir() {
        return outcome;
    }
    let now = SystemTime::now();

    for entry in WalkDir::new(root).sort_by_file_name() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("time limit reached during garbage collection");
            outcome.timed_out = true;
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable derivative entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_temp_file(entry.file_name()) {
            if is_stale(entry.path(), now) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        debug!(path = %entry.path().display(), "removed abandoned temp file");
                        outcome.temp_removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "could not remove temp file")
                    }
                }
            }
            continue;
        }
        if !paths::name_ends_with(entry.file_name(), mapper.suffix()) {
            continue;
        }

        let derivative = entry.path();
        let (original, reason) = removal_reason(mapper, exclusions, derivative);
        let Some(reason) = reason else {
            outcome.kept += 1;
            continue;
        };

        match std::fs::remove_file(derivative) {
            Ok(()) => {
                debug!(derivative = %derivative.display(), ?reason, "removed derivative");
                outcome.removed += 1;
                if let Some(tx) = events {
                    let _ = tx.send(SyncEvent::DerivativeRemoved {
                        derivative: display_path(root, derivative),
                        original: original.map(|o| display_path(mapper.source_root(), &o)),
                        reason,
                    });
                }
            }
            Err(e) => {
                warn!(derivative = %derivative.display(), error = %e, "could not remove derivative");
                if let Some(tx) = events {
                    let _ = tx.send(SyncEvent::DeletionFailed {
                        derivative: display_path(root, derivative),
                        message: e.to_string(),
                    });
                }
                outcome.failures.push((derivative.to_path_buf(), e.to_string()));
            }
        }
    }

    outcome
}

/// Path relative to `root` for display, falling back to the full path.
fn display_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
