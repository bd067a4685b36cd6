//! # webp-sync
//!
//! Keeps a tree of WebP derivatives in step with a tree of PNG and JPEG
//! originals. Each run deletes derivatives that no longer have a live source,
//! then (re)encodes every source whose derivative is missing or older than it.
//!
//! ```text
//! public/assets/photos/dawn.jpg        source
//! public/assets/_webp/photos/dawn.jpg.webp   derivative
//! ```
//!
//! Runs are idempotent: with no source changes, a second run converts nothing.
//!
//! # Architecture: Two Phases
//!
//! ```text
//! 1. Garbage collection   _webp/   →  orphaned and excluded derivatives removed
//! 2. Conversion           assets/  →  missing and stale derivatives encoded
//! ```
//!
//! The first phase finishes before the second starts. The conversion phase
//! runs on a rayon pool; every file yields an outcome and the counters are
//! folded together afterwards.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`sync`] | Runs both phases, streams progress events, produces the report |
//! | [`gc`] | Phase 1: removes derivatives whose source is missing or excluded |
//! | [`paths`] | Source ↔ derivative path mapping |
//! | [`exclude`] | Canonicalized exclusion roots |
//! | [`classify`] | Content-type and size gates applied before encoding |
//! | [`imaging`] | Backend trait plus the pure-Rust `image` implementation |
//! | [`report`] | Run counters, diagnostics, and the JSON report |
//! | [`config`] | `webp-sync.toml` loading, merging with defaults, validation |
//! | [`output`] | CLI output formatting for events, report, and `check` |
//! | [`admin_url`] | Marks image URLs built in admin contexts to bypass WebP |
//!
//! # Design Decisions
//!
//! ## Content Decides, Not Extensions
//!
//! Extensions only select candidates. The content type is sniffed from the
//! file's bytes, so a `.png` holding JPEG data is converted as a JPEG and a
//! `.png` holding text is reported as broken.
//!
//! ## Freshness by Modification Time
//!
//! No index is persisted. A derivative is stale only if it is strictly older
//! than its source; equal timestamps count as fresh.
//!
//! ## Atomic Writes
//!
//! Derivatives are encoded into a temporary file next to the target and
//! renamed into place. A failed or interrupted encode never leaves a
//! truncated derivative behind, and a previous derivative survives intact.

pub mod admin_url;
pub mod classify;
pub mod config;
pub mod exclude;
pub mod gc;
pub mod imaging;
pub mod output;
pub mod paths;
pub mod report;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;
