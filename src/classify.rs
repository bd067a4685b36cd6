//! Eligibility gates applied to each candidate before encoding.
//!
//! Gates run in order and the first failing gate wins:
//!
//! 1. **Content type**: the mime type is sniffed from the file's bytes. Only
//!    PNG and JPEG content is accepted, whatever the extension says.
//! 2. **Dimensions**: read from the header. A failed read is treated as
//!    "no size info" and does not block conversion.
//! 3. **Size**: images strictly above the configured megapixel limit are
//!    rejected.

use crate::imaging::{Dimensions, ImageBackend, UNKNOWN_MIME_TYPE};
use std::path::Path;
use tracing::debug;

/// Mime types accepted for conversion. `image/jpg` is not a registered type
/// but some sniffers report it.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// One megapixel, as 2^20 pixels.
const PIXELS_PER_MEGAPIXEL: f64 = 1_048_576.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible { dimensions: Option<Dimensions> },
    WrongType { mime: String },
    TooBig { megapixels: f64 },
}

pub fn megapixels(dimensions: Dimensions) -> f64 {
    dimensions.pixels() as f64 / PIXELS_PER_MEGAPIXEL
}

#[derive(Debug, Clone, Copy)]
pub struct EligibilityClassifier {
    size_limit_megapixels: f64,
}

impl EligibilityClassifier {
    pub fn new(size_limit_megapixels: f64) -> Self {
        Self {
            size_limit_megapixels,
        }
    }

    pub fn classify(&self, backend: &impl ImageBackend, path: &Path) -> Eligibility {
        let mime = backend.mime_type(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "mime sniffing failed");
            UNKNOWN_MIME_TYPE.to_string()
        });
        if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
            return Eligibility::WrongType { mime };
        }

        let dimensions = match backend.identify(path) {
            Ok(d) => Some(d),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no size info, converting anyway");
                None
            }
        };

        if let Some(d) = dimensions {
            let mp = megapixels(d);
            if mp > self.size_limit_megapixels {
                return Eligibility::TooBig { megapixels: mp };
            }
        }

        Eligibility::Eligible { dimensions }
    }
}
