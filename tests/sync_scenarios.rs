//! End-to-end runs with the real `image`-based backend.
//!
//! Each test builds a throwaway site, runs the full sync, and inspects the
//! derivative tree on disk.

use filetime::FileTime;
use image::{ImageEncoder, ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use webp_sync::config::SyncConfig;
use webp_sync::sync::{self, FileOutcome, SyncEvent};

struct Site {
    tmp: TempDir,
}

impl Site {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("public/assets")).unwrap();
        Self { tmp }
    }

    fn source(&self, relative: &str) -> PathBuf {
        self.tmp.path().join("public/assets").join(relative)
    }

    fn derivative(&self, relative: &str) -> PathBuf {
        self.tmp
            .path()
            .join("public/assets/_webp")
            .join(format!("{relative}.webp"))
    }

    fn run(&self, config: &SyncConfig) -> webp_sync::report::RunReport {
        sync::run(config, self.tmp.path(), None).unwrap()
    }
}

fn rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    })
}

fn write_png(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    image::codecs::png::PngEncoder::new(std::io::BufWriter::new(file))
        .write_image(rgb(width, height).as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    image::codecs::jpeg::JpegEncoder::new(std::io::BufWriter::new(file))
        .write_image(rgb(width, height).as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

fn is_webp(path: &Path) -> bool {
    let bytes = fs::read(path).unwrap();
    image::guess_format(&bytes).ok() == Some(ImageFormat::WebP)
}

#[test]
fn full_run_converts_tree_and_is_idempotent() {
    let site = Site::new();
    write_png(&site.source("a.png"), 32, 24);
    write_jpeg(&site.source("photos/b.jpg"), 40, 30);
    write_jpeg(&site.source("photos/deeper/c.JPEG"), 16, 16);
    fs::write(site.source("readme.txt"), "not a candidate").unwrap();

    let config = SyncConfig::default();
    let first = site.run(&config);

    assert_eq!(first.converted, 3);
    assert_eq!(first.total(), 3);
    assert!(is_webp(&site.derivative("a.png")));
    assert!(is_webp(&site.derivative("photos/b.jpg")));
    assert!(is_webp(&site.derivative("photos/deeper/c.JPEG")));
    assert_eq!(
        image::image_dimensions(site.derivative("photos/b.jpg")).unwrap(),
        (40, 30)
    );

    let second = site.run(&config);
    assert_eq!(second.converted, 0);
    assert_eq!(second.skipped_fresh, 3);
}

#[test]
fn classification_follows_content_not_extension() {
    let site = Site::new();
    write_jpeg(&site.source("disguised.png"), 20, 20);
    fs::write(site.source("fake.png"), "plain text pretending to be an image").unwrap();

    let report = site.run(&SyncConfig::default());

    assert_eq!(report.converted, 1);
    assert_eq!(report.broken, 1);
    assert!(is_webp(&site.derivative("disguised.png")));
    assert!(!site.derivative("fake.png").exists());
}

#[test]
fn size_limit_blocks_large_images() {
    let site = Site::new();
    // 1100 x 1000 = ~1.05 MP, over a 1 MP limit
    write_png(&site.source("large.png"), 1100, 1000);
    write_png(&site.source("small.png"), 100, 100);

    let config = SyncConfig {
        size_limit_megapixels: 1.0,
        ..SyncConfig::default()
    };
    let report = site.run(&config);

    assert_eq!(report.too_big, 1);
    assert_eq!(report.converted, 1);
    assert!(!site.derivative("large.png").exists());
}

#[test]
fn stale_derivative_is_replaced() {
    let site = Site::new();
    let source = site.source("a.png");
    write_png(&source, 8, 8);
    let derivative = site.derivative("a.png");
    fs::create_dir_all(derivative.parent().unwrap()).unwrap();
    fs::write(&derivative, "stale").unwrap();
    set_mtime(&derivative, 1_000);
    set_mtime(&source, 2_000);

    let report = site.run(&SyncConfig::default());

    assert_eq!(report.converted, 1);
    assert!(is_webp(&derivative));
}

#[test]
fn corrupt_source_fails_without_partial_output() {
    let site = Site::new();
    let source = site.source("truncated.png");
    write_png(&source, 64, 64);
    let bytes = fs::read(&source).unwrap();
    fs::write(&source, &bytes[..bytes.len() / 2]).unwrap();

    let report = site.run(&SyncConfig::default());

    assert_eq!(report.failed + report.general_exception, 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(!site.derivative("truncated.png").exists());
}

#[test]
fn excluded_and_orphaned_derivatives_are_removed() {
    let site = Site::new();
    write_png(&site.source("keep.png"), 8, 8);
    write_png(&site.source("private/secret.png"), 8, 8);
    write_png(&site.source("gone.png"), 8, 8);

    let first = site.run(&SyncConfig::default());
    assert_eq!(first.converted, 3);

    fs::remove_file(site.source("gone.png")).unwrap();
    let config = SyncConfig {
        exclude_paths: vec!["assets/private".into()],
        ..SyncConfig::default()
    };
    let (tx, rx) = std::sync::mpsc::channel();
    let second = sync::run(&config, site.tmp.path(), Some(&tx)).unwrap();
    drop(tx);

    assert_eq!(second.deleted, 2);
    assert_eq!(second.skipped_excluded, 1);
    assert_eq!(second.skipped_fresh, 1);
    assert!(site.derivative("keep.png").exists());
    assert!(!site.derivative("gone.png").exists());
    assert!(!site.derivative("private/secret.png").exists());

    let excluded_event = rx.into_iter().any(|event| {
        matches!(
            event,
            SyncEvent::FileProcessed {
                outcome: FileOutcome::SkippedExcluded,
                ..
            }
        )
    });
    assert!(excluded_event);
}

#[test]
fn custom_directory_name_and_suffix() {
    let site = Site::new();
    write_png(&site.source("a.png"), 8, 8);

    let config = SyncConfig {
        webp_directory_name: "optimized".into(),
        webp_file_suffix: ".opt.webp".into(),
        ..SyncConfig::default()
    };
    let report = site.run(&config);

    assert_eq!(report.converted, 1);
    let derivative = site
        .tmp
        .path()
        .join("public/assets/optimized/a.png.opt.webp");
    assert!(is_webp(&derivative));
}

#[test]
fn missing_source_root_aborts() {
    let tmp = TempDir::new().unwrap();
    let result = sync::run(&SyncConfig::default(), tmp.path(), None);
    assert!(matches!(result, Err(sync::SyncError::SourceRootMissing(_))));
}
