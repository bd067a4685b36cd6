//! Run counters and the final summary.
//!
//! A [`RunReport`] is assembled after each phase completes: GC results are
//! folded in with [`RunReport::record_gc`], per-file scan outcomes with
//! [`RunReport::record`]. Nothing increments a counter from inside a worker,
//! so the parallel scan phase needs no shared mutable state.

use crate::gc::GcOutcome;
use crate::sync::FileOutcome;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What went wrong for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ConversionFailed,
    GeneralException,
    DeletionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub segment: String,
    pub converted: u32,
    pub skipped_excluded: u32,
    pub skipped_fresh: u32,
    pub too_big: u32,
    pub broken: u32,
    pub failed: u32,
    pub general_exception: u32,
    pub not_attempted: u32,
    pub deleted: u32,
    pub deletion_failed: u32,
    pub timed_out: bool,
    #[serde(rename = "duration_seconds", serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub diagnostics: Vec<Diagnostic>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RunReport {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ..Self::default()
        }
    }

    /// Fold one scan-phase outcome into the counters.
    pub fn record(&mut self, path: &Path, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Converted => self.converted += 1,
            FileOutcome::SkippedExcluded => self.skipped_excluded += 1,
            FileOutcome::SkippedFresh => self.skipped_fresh += 1,
            FileOutcome::Broken { .. } => self.broken += 1,
            FileOutcome::TooBig { .. } => self.too_big += 1,
            FileOutcome::Failed { reason } => {
                self.failed += 1;
                self.diagnose(path, DiagnosticKind::ConversionFailed, reason);
            }
            FileOutcome::GeneralException { message } => {
                self.general_exception += 1;
                self.diagnose(path, DiagnosticKind::GeneralException, message);
            }
            FileOutcome::NotAttempted => {
                self.not_attempted += 1;
                self.timed_out = true;
            }
        }
    }

    /// Fold the GC phase results into the counters.
    pub fn record_gc(&mut self, gc: &GcOutcome) {
        self.deleted += gc.removed;
        self.timed_out |= gc.timed_out;
        self.deletion_failed += gc.failures.len() as u32;
        for (path, message) in &gc.failures {
            self.diagnose(path, DiagnosticKind::DeletionFailed, message);
        }
    }

    fn diagnose(&mut self, path: &Path, kind: DiagnosticKind, message: &str) {
        self.diagnostics.push(Diagnostic {
            path: path.to_path_buf(),
            kind,
            message: message.to_string(),
        });
    }

    /// Files left alone: excluded plus already fresh.
    pub fn skipped(&self) -> u32 {
        self.skipped_excluded + self.skipped_fresh
    }

    /// Every file the scan phase looked at.
    pub fn total(&self) -> u32 {
        self.converted
            + self.skipped()
            + self.too_big
            + self.broken
            + self.failed
            + self.general_exception
            + self.not_attempted
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} skipped, {} too big, {} broken, {} failed, {} general exceptions ({} total)",
            self.converted,
            self.skipped(),
            self.too_big,
            self.broken,
            self.failed,
            self.general_exception,
            self.total()
        )?;
        if self.deleted > 0 || self.deletion_failed > 0 {
            write!(
                f,
                "; {} deleted, {} deletion failures",
                self.deleted, self.deletion_failed
            )?;
        }
        if self.timed_out {
            write!(f, "; timed out, {} not attempted", self.not_attempted)?;
        }
        Ok(())
    }
}
