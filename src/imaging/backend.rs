//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the sync engine
//! needs from an image library: sniff the content type, identify the pixel
//! dimensions, and encode a WebP derivative.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The image could not be converted (corrupt data, unsupported feature).
    /// Recoverable: the file is retried on the next run.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn pixels(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Mime type reported when the content matches no known image format.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Name prefix of in-progress encodes written next to their derivative.
pub const TEMP_FILE_PREFIX: &str = ".webp-sync-";
/// Name suffix of in-progress encodes.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Parameters for a single WebP encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Trait for image backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Detect the mime type from the file's content, ignoring its extension.
    ///
    /// Returns [`UNKNOWN_MIME_TYPE`] when the content is not a recognized image.
    fn mime_type(&self, path: &Path) -> Result<String, BackendError>;

    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Encode `params.source` as WebP into `params.output`.
    ///
    /// Implementations must never leave a partial file at `params.output`:
    /// either the complete derivative is in place or the previous file (if
    /// any) is untouched.
    fn encode_webp(&self, params: &EncodeParams) -> Result<(), BackendError>;
}
