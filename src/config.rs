//! Sync configuration.
//!
//! Handles loading, validating, and resolving `webp-sync.toml`. User values
//! are merged on top of stock defaults, so a config file only needs the keys
//! it wants to change. The result is an immutable [`SyncConfig`] built once at
//! startup and passed by reference into every component.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! public_root = "public"          # Public web root (relative to this file)
//! assets_dir = "assets"           # Source tree, inside the public root
//! webp_directory_name = "_webp"   # Derivative tree, inside the source tree
//! webp_file_suffix = ".webp"      # Appended to the full source file name
//! size_limit_megapixels = 32.0    # Larger images are never encoded
//! exclude_paths = []              # Relative to the public root
//! segment = "webpconvert"         # Job identifier for schedulers
//! time_limit_seconds = 3600       # Wall-clock budget for one run
//!
//! [scan]
//! extensions = ["png", "jpg", "jpeg"]
//! case_sensitive = false
//!
//! [processing]
//! max_processes = 4               # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "webp-sync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Sync configuration loaded from `webp-sync.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Public web root. Relative paths are resolved against the directory
    /// holding the config file.
    pub public_root: PathBuf,
    /// Source tree inside the public root.
    pub assets_dir: String,
    /// Name of the derivative tree, created inside the source tree.
    pub webp_directory_name: String,
    /// Suffix appended to the source file name to form the derivative name.
    pub webp_file_suffix: String,
    /// Images above this many megapixels (2^20 pixels) are not converted.
    pub size_limit_megapixels: f64,
    /// Directories (relative to the public root) whose images are skipped
    /// and whose derivatives are removed.
    pub exclude_paths: Vec<String>,
    /// Identifies this job to external schedulers.
    pub segment: String,
    /// Wall-clock budget for one run, in seconds.
    pub time_limit_seconds: u64,
    /// Candidate file selection.
    pub scan: ScanConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            public_root: PathBuf::from("public"),
            assets_dir: "assets".to_string(),
            webp_directory_name: "_webp".to_string(),
            webp_file_suffix: ".webp".to_string(),
            size_limit_megapixels: 32.0,
            exclude_paths: Vec::new(),
            segment: "webpconvert".to_string(),
            time_limit_seconds: 60 * 60,
            scan: ScanConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// Absolute, normalized roots for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoots {
    pub public_root: PathBuf,
    pub source_root: PathBuf,
    pub derivative_root: PathBuf,
}

impl SyncConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webp_file_suffix.is_empty() || !self.webp_file_suffix.starts_with('.') {
            return Err(ConfigError::Validation(
                "webp_file_suffix must be non-empty and start with '.'".into(),
            ));
        }
        if self.webp_file_suffix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "webp_file_suffix must not contain path separators".into(),
            ));
        }
        if !is_single_normal_component(&self.webp_directory_name) {
            return Err(ConfigError::Validation(
                "webp_directory_name must be a single directory name".into(),
            ));
        }
        if !is_relative_descendant(&self.assets_dir) {
            return Err(ConfigError::Validation(
                "assets_dir must be a relative path without '..'".into(),
            ));
        }
        if !(self.size_limit_megapixels.is_finite() && self.size_limit_megapixels > 0.0) {
            return Err(ConfigError::Validation(
                "size_limit_megapixels must be a positive number".into(),
            ));
        }
        if self.time_limit_seconds == 0 {
            return Err(ConfigError::Validation(
                "time_limit_seconds must be greater than zero".into(),
            ));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the public, source, and derivative roots.
    ///
    /// `base_dir` anchors a relative `public_root` (normally the directory of
    /// the config file).
    pub fn resolve_roots(&self, base_dir: &Path) -> std::io::Result<SyncRoots> {
        let public_root = paths::normalize(&base_dir.join(&self.public_root))?;
        let source_root = public_root.join(&self.assets_dir);
        let derivative_root = source_root.join(&self.webp_directory_name);
        Ok(SyncRoots {
            public_root,
            source_root,
            derivative_root,
        })
    }
}

fn is_single_normal_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_relative_descendant(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Which files in the source tree are conversion candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Candidate extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Match extensions exactly instead of ignoring ASCII case.
    pub case_sensitive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            case_sensitive: false,
        }
    }
}

impl ScanConfig {
    /// True if `path` has one of the candidate extensions.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|candidate| {
            if self.case_sensitive {
                candidate == ext
            } else {
                candidate.eq_ignore_ascii_case(ext)
            }
        })
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SyncConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SyncConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SyncConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Directory that anchors relative paths in the config file at `path`.
pub fn config_base_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Returns a fully-commented stock `webp-sync.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# webp-sync configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Public web root. Relative paths are resolved against this file's directory.
public_root = "public"

# Source tree inside the public root. Every PNG/JPEG under it gets a WebP
# derivative.
assets_dir = "assets"

# Derivative tree, created inside the source tree. It mirrors the source
# tree's layout.
webp_directory_name = "_webp"

# Appended to the full source file name: photo.jpg -> photo.jpg.webp
webp_file_suffix = ".webp"

# Images larger than this (in 2^20-pixel megapixels) are never encoded.
size_limit_megapixels = 32.0

# Directories relative to the public root. Images inside them are skipped
# and any existing derivatives for them are deleted.
exclude_paths = []

# Identifies this job to external schedulers.
segment = "webpconvert"

# Wall-clock budget for one run. When exceeded, remaining files are left for
# the next run and the report is still printed.
time_limit_seconds = 3600

# ---------------------------------------------------------------------------
# Candidate selection
# ---------------------------------------------------------------------------
[scan]
# File extensions (without the dot) considered for conversion. The file
# content is always checked too; the extension only selects candidates.
extensions = ["png", "jpg", "jpeg"]

# Match extensions exactly instead of ignoring ASCII case.
case_sensitive = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encode workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
