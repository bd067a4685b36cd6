//! Shared test utilities for the webp-sync test suite.
//!
//! Provides synthetic image writers, mtime control, and a throwaway
//! public/source/derivative tree laid out the way a real site is.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new();
//! let photo = site.source("photos/dawn.png");
//! create_test_png(&photo, 32, 32);
//! set_mtime(&photo, 1_000);
//!
//! let report = run_with_backend(&backend, &site.config(), site.base_dir(), None).unwrap();
//! assert!(site.derivative("photos/dawn.png").exists());
//! ```

use filetime::FileTime;
use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::SyncConfig;

// =========================================================================
// Synthetic images
// =========================================================================

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid PNG file with the given dimensions.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write arbitrary bytes, creating parent directories.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    ensure_parent(path);
    std::fs::write(path, contents).unwrap();
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

// =========================================================================
// Modification times
// =========================================================================

/// Set a file's mtime to `secs` after the Unix epoch.
pub fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

// =========================================================================
// Site fixture
// =========================================================================

/// A temporary site: `<tmp>/public/assets` with `_webp` inside it.
pub struct SiteFixture {
    tmp: TempDir,
    pub public_root: PathBuf,
    pub source_root: PathBuf,
    pub derivative_root: PathBuf,
}

impl SiteFixture {
    /// Creates the public and source roots. The derivative root is left for
    /// the run to create.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let public_root = tmp.path().join("public");
        let source_root = public_root.join("assets");
        let derivative_root = source_root.join("_webp");
        std::fs::create_dir_all(&source_root).unwrap();
        Self {
            tmp,
            public_root,
            source_root,
            derivative_root,
        }
    }

    /// Directory relative config paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.tmp.path()
    }

    /// Default config pointing at this fixture.
    pub fn config(&self) -> SyncConfig {
        SyncConfig {
            public_root: PathBuf::from("public"),
            ..SyncConfig::default()
        }
    }

    /// Absolute source path for `relative`.
    pub fn source(&self, relative: &str) -> PathBuf {
        self.source_root.join(relative)
    }

    /// Absolute derivative path for the source at `relative`.
    pub fn derivative(&self, relative: &str) -> PathBuf {
        self.derivative_root.join(format!("{relative}.webp"))
    }
}
