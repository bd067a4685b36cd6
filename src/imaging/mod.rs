//! Image operations in pure Rust, with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Mime sniffing** | `image::ImageReader::with_guessed_format` |
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Encode → WebP** | `image::codecs::webp::WebPEncoder` |
//!
//! The module is split into:
//! - **Backend**: [`ImageBackend`] trait, shared types, and the test mock
//! - **RustBackend**: the `image`-crate implementation used in production

pub mod backend;
pub mod rust_backend;

pub use backend::{
    BackendError, Dimensions, EncodeParams, ImageBackend, TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX,
    UNKNOWN_MIME_TYPE,
};
pub use rust_backend::RustBackend;
