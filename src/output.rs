//! CLI output formatting for the sync run.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! ==> webpconvert
//!     Derivatives: /srv/site/public/assets/_webp
//!     Sources: /srv/site/public/assets
//! ==> Deleting unneeded WebP files
//!     deleted old/gone.png.webp (source missing)
//! ==> Converting and updating images
//!     photos/dawn.jpg: converted
//!     photos/dusk.jpg: skipped (up to date)
//!     notes.png: broken (text/plain)
//!     panorama.jpg: too big (64.0 MP)
//! ==> Done! (1.42s)
//!     Converted: 1
//!     Skipped: 1 (0 excluded, 1 up to date)
//!     ...
//! ```
//!
//! ## Check
//!
//! ```text
//! ==> Checking webp-sync.toml
//!     Public root: /srv/site/public
//!     Sources: /srv/site/public/assets
//!     Derivatives: /srv/site/public/assets/_webp
//!     Exclude: /srv/site/public/assets/private
//!     Exclude (missing, ignored): /srv/site/public/assets/gone
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::config::SyncRoots;
use crate::exclude::ExclusionFilter;
use crate::gc::RemovalReason;
use crate::report::RunReport;
use crate::sync::{FileOutcome, Phase, SyncEvent};
use std::path::Path;

/// Longest reason shown on a per-file line.
const MAX_REASON_CHARS: usize = 120;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// First line of `text`, cut to [`MAX_REASON_CHARS`] with `...` appended.
fn short_reason(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    match line.char_indices().nth(MAX_REASON_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

fn outcome_label(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Converted => "converted".to_string(),
        FileOutcome::SkippedExcluded => "skipped (excluded)".to_string(),
        FileOutcome::SkippedFresh => "skipped (up to date)".to_string(),
        FileOutcome::Broken { mime } => format!("broken ({mime})"),
        FileOutcome::TooBig { megapixels } => format!("too big ({megapixels:.1} MP)"),
        FileOutcome::Failed { reason } => format!("conversion failed: {}", short_reason(reason)),
        FileOutcome::GeneralException { message } => {
            format!("general exception: {}", short_reason(message))
        }
        FileOutcome::NotAttempted => "not attempted (time limit)".to_string(),
    }
}

fn reason_label(reason: RemovalReason) -> &'static str {
    match reason {
        RemovalReason::SourceMissing => "source missing",
        RemovalReason::SourceExcluded => "source excluded",
    }
}

// ============================================================================
// Run events
// ============================================================================

/// Format a single sync event.
pub fn format_sync_event(event: &SyncEvent) -> Vec<String> {
    match event {
        SyncEvent::RunStarted {
            segment,
            source_root,
            derivative_root,
        } => vec![
            format!("==> {segment}"),
            format!("{}Derivatives: {}", indent(1), derivative_root.display()),
            format!("{}Sources: {}", indent(1), source_root.display()),
        ],
        SyncEvent::PhaseStarted(Phase::GarbageCollection) => {
            vec!["==> Deleting unneeded WebP files".to_string()]
        }
        SyncEvent::PhaseStarted(Phase::Conversion) => {
            vec!["==> Converting and updating images".to_string()]
        }
        SyncEvent::DerivativeRemoved {
            derivative, reason, ..
        } => vec![format!(
            "{}deleted {} ({})",
            indent(1),
            derivative.display(),
            reason_label(*reason)
        )],
        SyncEvent::DeletionFailed {
            derivative,
            message,
        } => vec![format!(
            "{}could not delete {}: {}",
            indent(1),
            derivative.display(),
            short_reason(message)
        )],
        SyncEvent::FileProcessed {
            relative_path,
            outcome,
        } => vec![format!(
            "{}{}: {}",
            indent(1),
            relative_path.display(),
            outcome_label(outcome)
        )],
    }
}

pub fn print_sync_event(event: &SyncEvent) {
    for line in format_sync_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Report
// ============================================================================

/// Format the end-of-run summary.
pub fn format_report(report: &RunReport) -> Vec<String> {
    let i = indent(1);
    let mut lines = vec![
        format!("==> Done! ({:.2}s)", report.duration.as_secs_f64()),
        format!("{i}Converted: {}", report.converted),
        format!(
            "{i}Skipped: {} ({} excluded, {} up to date)",
            report.skipped(),
            report.skipped_excluded,
            report.skipped_fresh
        ),
        format!("{i}Too big: {}", report.too_big),
        format!("{i}Broken: {}", report.broken),
        format!("{i}Failed: {}", report.failed),
        format!("{i}General exceptions: {}", report.general_exception),
        format!("{i}Deleted: {}", report.deleted),
        format!("{i}Deletion failures: {}", report.deletion_failed),
    ];
    if report.timed_out {
        lines.push(format!(
            "{i}Time limit reached: {} not attempted",
            report.not_attempted
        ));
    }
    lines
}

pub fn print_report(report: &RunReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the resolved roots and exclusions for `check`.
pub fn format_check_output(
    config_path: &Path,
    roots: &SyncRoots,
    exclusions: &ExclusionFilter,
) -> Vec<String> {
    let i = indent(1);
    let mut lines = vec![
        format!("==> Checking {}", config_path.display()),
        format!("{i}Public root: {}", roots.public_root.display()),
        format!("{i}Sources: {}", roots.source_root.display()),
        format!("{i}Derivatives: {}", roots.derivative_root.display()),
    ];
    for root in exclusions.roots() {
        lines.push(format!("{i}Exclude: {}", root.display()));
    }
    for dropped in exclusions.dropped() {
        lines.push(format!("{i}Exclude (missing, ignored): {}", dropped.display()));
    }
    lines
}

pub fn print_check_output(config_path: &Path, roots: &SyncRoots, exclusions: &ExclusionFilter) {
    for line in format_check_output(config_path, roots, exclusions) {
        println!("{}", line);
    }
}
