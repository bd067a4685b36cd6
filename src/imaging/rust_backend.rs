//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Mime sniffing | `ImageReader::with_guessed_format` (magic bytes only) |
//! | Identify | `ImageReader::into_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG) | `image` crate decoders |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Atomic write | `tempfile::NamedTempFile` in the output directory + `persist` |

use super::backend::{
    BackendError, Dimensions, EncodeParams, ImageBackend, TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX,
    UNKNOWN_MIME_TYPE,
};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageError, ImageReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a reader whose format comes from the content alone.
///
/// `ImageReader::open` would seed the format from the extension and keep it
/// when sniffing fails, which lets a mislabeled file pass as its extension.
fn content_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    let file = File::open(path)?;
    Ok(ImageReader::new(BufReader::new(file)).with_guessed_format()?)
}

/// Split `image` errors into recoverable conversion failures and the rest.
fn classify_image_error(path: &Path, err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ) =>
        {
            BackendError::ConversionFailed(format!("{}: {}", path.display(), e))
        }
        ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::ConversionFailed(format!("{}: {}", path.display(), other)),
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let reader = content_reader(path)?;
    if reader.format().is_none() {
        return Err(BackendError::ConversionFailed(format!(
            "{}: unrecognized image format",
            path.display()
        )));
    }
    reader.decode().map_err(|e| classify_image_error(path, e))
}

/// The lossless WebP encoder accepts 8-bit L, LA, RGB and RGBA buffers only.
fn to_webp_compatible(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Mode of written derivatives: world-readable, owner-writable.
#[cfg(unix)]
const DERIVATIVE_MODE: u32 = 0o644;

/// Encode `img` as WebP next to `output`, then atomically move it into place.
fn save_webp_atomic(img: &DynamicImage, output: &Path) -> Result<(), BackendError> {
    let dir = output.parent().ok_or_else(|| {
        BackendError::ProcessingFailed(format!("{} has no parent directory", output.display()))
    })?;

    // Leading dot keeps the temp file out of the derivative glob.
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(TEMP_FILE_SUFFIX)
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        img.write_with_encoder(WebPEncoder::new_lossless(&mut writer))
            .map_err(|e| classify_image_error(output, e))?;
        writer.flush()?;
    }
    // Temp files are created 0600; derivatives must be readable by the web
    // server. fchmod is not subject to the umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(DERIVATIVE_MODE))?;
    }
    tmp.persist(output).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn mime_type(&self, path: &Path) -> Result<String, BackendError> {
        let reader = content_reader(path)?;
        Ok(reader
            .format()
            .map(|f| f.to_mime_type())
            .unwrap_or(UNKNOWN_MIME_TYPE)
            .to_string())
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = content_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn encode_webp(&self, params: &EncodeParams) -> Result<(), BackendError> {
        let img = to_webp_compatible(load_image(&params.source)?);
        save_webp_atomic(&img, &params.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_jpeg, create_test_png};
    use image::ImageFormat;

    #[test]
    fn mime_type_of_png_and_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let png = tmp.path().join("a.png");
        let jpg = tmp.path().join("b.jpg");
        create_test_png(&png, 10, 10);
        create_test_jpeg(&jpg, 10, 10);

        let backend = RustBackend::new();
        assert_eq!(backend.mime_type(&png).unwrap(), "image/png");
        assert_eq!(backend.mime_type(&jpg).unwrap(), "image/jpeg");
    }

    #[test]
    fn mime_type_ignores_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let disguised = tmp.path().join("really-a-jpeg.png");
        create_test_jpeg(&disguised, 10, 10);

        let backend = RustBackend::new();
        assert_eq!(backend.mime_type(&disguised).unwrap(), "image/jpeg");
    }

    #[test]
    fn mime_type_of_text_file_is_unknown() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fake = tmp.path().join("notes.png");
        std::fs::write(&fake, "definitely not an image").unwrap();

        let backend = RustBackend::new();
        assert_eq!(backend.mime_type(&fake).unwrap(), UNKNOWN_MIME_TYPE);
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn encode_png_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 64, 48);
        let output = tmp.path().join("source.png.webp");

        RustBackend::new()
            .encode_webp(&EncodeParams {
                source,
                output: output.clone(),
            })
            .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
        assert_eq!(image::image_dimensions(&output).unwrap(), (64, 48));
    }

    #[test]
    fn encode_jpeg_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 40, 30);
        let output = tmp.path().join("photo.jpg.webp");

        RustBackend::new()
            .encode_webp(&EncodeParams {
                source,
                output: output.clone(),
            })
            .unwrap();

        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn encode_truncated_png_fails_and_leaves_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.png");
        create_test_png(&source, 64, 64);
        let bytes = std::fs::read(&source).unwrap();
        std::fs::write(&source, &bytes[..bytes.len() / 2]).unwrap();
        let output = tmp.path().join("broken.png.webp");

        let result = RustBackend::new().encode_webp(&EncodeParams {
            source,
            output: output.clone(),
        });

        assert!(result.is_err());
        assert!(!output.exists());
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn encoded_derivative_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("a.png");
        create_test_png(&source, 8, 8);
        let output = tmp.path().join("a.png.webp");

        RustBackend::new()
            .encode_webp(&EncodeParams {
                source,
                output: output.clone(),
            })
            .unwrap();

        let mode = std::fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn encode_keeps_previous_derivative_on_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("garbage.png");
        std::fs::write(&source, "garbage").unwrap();
        let output = tmp.path().join("garbage.png.webp");
        std::fs::write(&output, "previous").unwrap();

        let result = RustBackend::new().encode_webp(&EncodeParams {
            source,
            output: output.clone(),
        });

        assert!(matches!(result, Err(BackendError::ConversionFailed(_))));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
    }

    #[test]
    fn encode_sixteen_bit_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("deep.png");
        let img = image::ImageBuffer::from_fn(16, 16, |x, y| {
            image::Rgb([(x * 4000) as u16, (y * 4000) as u16, 30000u16])
        });
        DynamicImage::ImageRgb16(img).save(&source).unwrap();
        let output = tmp.path().join("deep.png.webp");

        RustBackend::new()
            .encode_webp(&EncodeParams {
                source,
                output: output.clone(),
            })
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (16, 16));
    }
}
