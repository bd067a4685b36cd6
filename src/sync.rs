//! The sync run: garbage collection, then conversion.
//!
//! ## Phases
//!
//! 1. **Garbage collection** ([`crate::gc`]): derivatives whose source is
//!    missing or excluded are deleted. Runs to completion first.
//! 2. **Conversion**: every candidate under the source root is checked and,
//!    when its derivative is missing or stale, encoded. Candidates are
//!    processed in parallel on the rayon pool.
//!
//! ## Per-file decision
//!
//! ```text
//! excluded?          → skipped (excluded)
//! wrong content?     → broken
//! over size limit?   → too big
//! derivative fresh?  → skipped (fresh)
//! otherwise          → encode → converted | failed | general exception
//! ```
//!
//! A derivative is fresh unless it is missing or strictly older than its
//! source. Per-file failures never abort the run; only configuration problems
//! and invalid paths do.
//!
//! Progress is streamed through an optional [`SyncEvent`] channel; counters are
//! folded into the [`RunReport`] after each phase.

use crate::classify::{Eligibility, EligibilityClassifier};
use crate::config::{ScanConfig, SyncConfig};
use crate::exclude::ExclusionFilter;
use crate::gc::{self, RemovalReason};
use crate::imaging::{BackendError, EncodeParams, ImageBackend, RustBackend};
use crate::paths::{self, PathError, PathMapper};
use crate::report::RunReport;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid path: {0}")]
    Path(#[from] PathError),
    #[error("Source root does not exist: {}", .0.display())]
    SourceRootMissing(PathBuf),
    #[error("Cannot create derivative root {}: {source}", path.display())]
    DerivativeRoot { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    GarbageCollection,
    Conversion,
}

/// Result of processing one candidate in the conversion phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted,
    SkippedExcluded,
    SkippedFresh,
    /// Content is not PNG or JPEG, whatever the extension says.
    Broken { mime: String },
    TooBig { megapixels: f64 },
    /// The encoder rejected the image. Retried on the next run.
    Failed { reason: String },
    GeneralException { message: String },
    /// The time budget ran out before this file was started.
    NotAttempted,
}

/// Progress events emitted during a run.
///
/// Paths are relative to the source root (for sources) or the derivative
/// root (for derivatives).
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RunStarted {
        segment: String,
        source_root: PathBuf,
        derivative_root: PathBuf,
    },
    PhaseStarted(Phase),
    DerivativeRemoved {
        derivative: PathBuf,
        original: Option<PathBuf>,
        reason: RemovalReason,
    },
    DeletionFailed {
        derivative: PathBuf,
        message: String,
    },
    FileProcessed {
        relative_path: PathBuf,
        outcome: FileOutcome,
    },
}

fn emit(events: Option<&Sender<SyncEvent>>, event: SyncEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Run a full sync with the `image`-based backend.
///
/// `base_dir` anchors a relative `public_root`.
pub fn run(
    config: &SyncConfig,
    base_dir: &Path,
    events: Option<&Sender<SyncEvent>>,
) -> Result<RunReport, SyncError> {
    run_with_backend(&RustBackend::new(), config, base_dir, events)
}

/// Run a full sync with the given backend, bounded by the configured
/// time limit.
pub fn run_with_backend(
    backend: &impl ImageBackend,
    config: &SyncConfig,
    base_dir: &Path,
    events: Option<&Sender<SyncEvent>>,
) -> Result<RunReport, SyncError> {
    let deadline = Instant::now().checked_add(Duration::from_secs(config.time_limit_seconds));
    run_until(backend, config, base_dir, deadline, events)
}

/// Run a full sync that starts no new work once `deadline` has passed.
///
/// Work cut off by the deadline is reported, not failed: GC stops walking
/// and the remaining candidates are counted as not attempted.
pub fn run_until(
    backend: &impl ImageBackend,
    config: &SyncConfig,
    base_dir: &Path,
    deadline: Option<Instant>,
    events: Option<&Sender<SyncEvent>>,
) -> Result<RunReport, SyncError> {
    let started = Instant::now();

    let roots = config.resolve_roots(base_dir)?;
    if !roots.source_root.is_dir() {
        return Err(SyncError::SourceRootMissing(roots.source_root));
    }
    fs::create_dir_all(&roots.derivative_root).map_err(|source| SyncError::DerivativeRoot {
        path: roots.derivative_root.clone(),
        source,
    })?;

    let mapper = PathMapper::new(
        &roots.source_root,
        &roots.derivative_root,
        &config.webp_file_suffix,
    );
    let exclusions = ExclusionFilter::resolve(&roots.public_root, &config.exclude_paths);
    info!(
        segment = %config.segment,
        source_root = %roots.source_root.display(),
        derivative_root = %roots.derivative_root.display(),
        "starting sync"
    );
    emit(
        events,
        SyncEvent::RunStarted {
            segment: config.segment.clone(),
            source_root: roots.source_root.clone(),
            derivative_root: roots.derivative_root.clone(),
        },
    );

    let mut report = RunReport::new(&config.segment);

    emit(events, SyncEvent::PhaseStarted(Phase::GarbageCollection));
    let gc_outcome = gc::collect_garbage(&mapper, &exclusions, deadline, events);
    report.record_gc(&gc_outcome);
    info!(
        removed = gc_outcome.removed,
        kept = gc_outcome.kept,
        failed = gc_outcome.failures.len(),
        "garbage collection finished"
    );

    emit(events, SyncEvent::PhaseStarted(Phase::Conversion));
    let candidates = find_candidates(&mapper, &config.scan);
    debug!(count = candidates.len(), "found conversion candidates");

    let scanner = ConversionScanner {
        backend,
        mapper: &mapper,
        exclusions: &exclusions,
        classifier: EligibilityClassifier::new(config.size_limit_megapixels),
        deadline,
    };
    let outcomes = candidates
        .par_iter()
        .map(|source| {
            let outcome = scanner.process(source)?;
            let relative_path = mapper
                .relative_path(source)
                .unwrap_or(source.as_path())
                .to_path_buf();
            emit(
                events,
                SyncEvent::FileProcessed {
                    relative_path: relative_path.clone(),
                    outcome: outcome.clone(),
                },
            );
            Ok::<_, SyncError>((relative_path, outcome))
        })
        .collect::<Result<Vec<_>, SyncError>>()?;

    for (relative_path, outcome) in &outcomes {
        report.record(relative_path, outcome);
    }
    report.duration = started.elapsed();
    info!(report = %report, "sync finished");
    Ok(report)
}

fn is_hidden(entry: &DirEntry) -> bool {
    paths::is_hidden_name(entry.file_name())
}

/// Candidate source files in walk order.
///
/// Skips dotfiles, dot-directories, and the derivative tree. Symlinks are
/// followed; unreadable entries are logged and skipped.
pub fn find_candidates(mapper: &PathMapper, scan: &ScanConfig) -> Vec<PathBuf> {
    WalkDir::new(mapper.source_root())
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(is_hidden(e) || mapper.is_in_derivative_tree(e.path()))
        })
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "skipping unreadable source entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && scan.matches(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// True if the derivative is missing or strictly older than the source.
fn needs_conversion(source: &Path, derivative: &Path) -> io::Result<bool> {
    let derivative_mtime = match fs::metadata(derivative) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let source_mtime = fs::metadata(source)?.modified()?;
    Ok(derivative_mtime < source_mtime)
}

/// Decides and performs the work for one candidate.
pub struct ConversionScanner<'a, B: ImageBackend> {
    pub backend: &'a B,
    pub mapper: &'a PathMapper,
    pub exclusions: &'a ExclusionFilter,
    pub classifier: EligibilityClassifier,
    /// No new file is started at or after this instant.
    pub deadline: Option<Instant>,
}

impl<B: ImageBackend> ConversionScanner<'_, B> {
    /// Only an invalid source path is an error; everything else is an outcome.
    pub fn process(&self, source: &Path) -> Result<FileOutcome, SyncError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(FileOutcome::NotAttempted);
        }
        if self.exclusions.is_excluded(source) {
            return Ok(FileOutcome::SkippedExcluded);
        }
        match self.classifier.classify(self.backend, source) {
            Eligibility::WrongType { mime } => return Ok(FileOutcome::Broken { mime }),
            Eligibility::TooBig { megapixels } => return Ok(FileOutcome::TooBig { megapixels }),
            Eligibility::Eligible { .. } => {}
        }

        let derivative = self.mapper.derivative_path_of(source)?;
        match needs_conversion(source, &derivative) {
            Ok(false) => return Ok(FileOutcome::SkippedFresh),
            Ok(true) => {}
            Err(e) => {
                return Ok(FileOutcome::GeneralException {
                    message: e.to_string(),
                });
            }
        }
        if let Some(parent) = derivative.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return Ok(FileOutcome::GeneralException {
                    message: e.to_string(),
                });
            }
        }

        let params = EncodeParams {
            source: source.to_path_buf(),
            output: derivative,
        };
        Ok(match self.backend.encode_webp(&params) {
            Ok(()) => FileOutcome::Converted,
            Err(BackendError::ConversionFailed(reason)) => {
                warn!(source = %source.display(), %reason, "conversion failed");
                FileOutcome::Failed { reason }
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "general exception");
                FileOutcome::GeneralException {
                    message: e.to_string(),
                }
            }
        })
    }
}
