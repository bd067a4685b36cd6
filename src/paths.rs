//! Mapping between source images and their WebP derivatives.
//!
//! A derivative lives at the same relative position under the derivative
//! root as its source under the source root, with the configured suffix
//! appended to the full file name (extension included):
//!
//! ```text
//! public/assets/photos/dawn.jpg  →  public/assets/_webp/photos/dawn.jpg.webp
//! ```
//!
//! Keeping the original extension makes the mapping invertible: stripping the
//! suffix from a derivative name yields exactly one source name. Root matching
//! is component-wise on lexically normalized paths; symlinks are *not*
//! resolved here (see [`crate::exclude`] for the canonical-path side).

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("{path} is not under {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Make `path` absolute and fold `.` and `..` components without touching
/// the filesystem.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// True if the file name starts with a dot. Works on names that are not UTF-8.
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

/// True if the file name starts with `prefix`. Works on names that are not UTF-8.
pub fn name_starts_with(name: &OsStr, prefix: &str) -> bool {
    name.as_encoded_bytes().starts_with(prefix.as_bytes())
}

/// True if the file name ends with `suffix`. Works on names that are not UTF-8.
pub fn name_ends_with(name: &OsStr, suffix: &str) -> bool {
    name.as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// `name` without `suffix`, if it ends with it and a non-empty stem remains.
#[cfg(unix)]
pub fn strip_name_suffix(name: &OsStr, suffix: &str) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;

    name.as_bytes()
        .strip_suffix(suffix.as_bytes())
        .filter(|stem| !stem.is_empty())
        .map(|stem| OsStr::from_bytes(stem).to_os_string())
}

/// `name` without `suffix`, if it ends with it and a non-empty stem remains.
#[cfg(not(unix))]
pub fn strip_name_suffix(name: &OsStr, suffix: &str) -> Option<OsString> {
    name.to_str()?
        .strip_suffix(suffix)
        .filter(|stem| !stem.is_empty())
        .map(OsString::from)
}

/// Converts source paths to derivative paths and back.
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    derivative_root: PathBuf,
    suffix: String,
}

impl PathMapper {
    /// Both roots are expected to be normalized absolute paths.
    pub fn new(
        source_root: impl Into<PathBuf>,
        derivative_root: impl Into<PathBuf>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            derivative_root: derivative_root.into(),
            suffix: suffix.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn derivative_root(&self) -> &Path {
        &self.derivative_root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Path of `source` relative to the source root, if it is under it.
    pub fn relative_path<'a>(&self, source: &'a Path) -> Option<&'a Path> {
        source.strip_prefix(&self.source_root).ok()
    }

    /// Derivative path for a source file.
    ///
    /// ```text
    /// <source_root>/a/b.png  →  <derivative_root>/a/b.png<suffix>
    /// ```
    pub fn derivative_path_of(&self, source: &Path) -> Result<PathBuf, PathError> {
        let relative = self
            .relative_path(source)
            .filter(|r| !r.as_os_str().is_empty())
            .ok_or_else(|| PathError::OutsideRoot {
                path: source.to_path_buf(),
                root: self.source_root.clone(),
            })?;
        let mut derivative = self.derivative_root.join(relative).into_os_string();
        derivative.push(&self.suffix);
        Ok(PathBuf::from(derivative))
    }

    /// Source path a derivative was made from.
    ///
    /// Returns `None` when `derivative` is not under the derivative root. A
    /// name without the suffix maps unchanged.
    pub fn source_path_of(&self, derivative: &Path) -> Option<PathBuf> {
        let relative = derivative.strip_prefix(&self.derivative_root).ok()?;
        let stem = relative
            .file_name()
            .and_then(|name| strip_name_suffix(name, &self.suffix));
        let relative = match stem {
            Some(stem) => relative.with_file_name(stem),
            None => relative.to_path_buf(),
        };
        Some(self.source_root.join(relative))
    }

    /// True if `path` is the derivative root or inside it.
    pub fn is_in_derivative_tree(&self, path: &Path) -> bool {
        path.starts_with(&self.derivative_root)
    }
}
