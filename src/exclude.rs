//! Exclusion roots.
//!
//! Configured exclusion paths are relative to the public root. They are
//! canonicalized once, when the filter is built; entries that do not exist are
//! dropped and can never match. Every check canonicalizes the candidate too,
//! so a symlink pointing into an excluded directory is still excluded.

use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    roots: Vec<PathBuf>,
    dropped: Vec<PathBuf>,
}

impl ExclusionFilter {
    /// Resolve `exclude_paths` against `public_root`.
    pub fn resolve(public_root: &Path, exclude_paths: &[String]) -> Self {
        let mut filter = Self::default();
        for configured in exclude_paths {
            // Leading slashes still mean "relative to the public root".
            let candidate = public_root.join(configured.trim_start_matches(['/', '\\']));
            match std::fs::canonicalize(&candidate) {
                Ok(root) => filter.roots.push(root),
                Err(e) => {
                    debug!(path = %candidate.display(), error = %e, "dropping exclusion path");
                    filter.dropped.push(candidate);
                }
            }
        }
        filter
    }

    /// Canonical exclusion roots in configuration order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Configured paths that did not resolve.
    pub fn dropped(&self) -> &[PathBuf] {
        &self.dropped
    }

    /// True iff the canonical form of `path` lies under an exclusion root.
    ///
    /// Paths that cannot be canonicalized (missing, dangling symlink) are not
    /// excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.roots.is_empty() {
            return false;
        }
        match std::fs::canonicalize(path) {
            Ok(canonical) => self.roots.iter().any(|root| canonical.starts_with(root)),
            Err(_) => false,
        }
    }
}
