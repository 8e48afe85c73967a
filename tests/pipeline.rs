//! End-to-end checks of the convert pipeline with the real codecs.
//!
//! Inputs are generated into a temp directory, acquired through a `Session`,
//! converted with `RustBackend`, and delivered to a `DirectorySink`.

use image::{DynamicImage, ImageFormat, RgbImage, Rgba, RgbaImage};
use pixbatch::config::{self, PixbatchConfig};
use pixbatch::imaging::{DimensionLocks, OutputFormat, OutputSpec, Quality, RustBackend};
use pixbatch::package::{DirectorySink, MemorySink};
use pixbatch::session::{ConvertOutcome, Session};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height)
        .save_with_format(&path, format)
        .unwrap();
    path
}

fn output_spec(format: OutputFormat, archive: bool) -> OutputSpec {
    OutputSpec {
        format,
        quality: Quality::default(),
        archive,
    }
}

#[test]
fn single_800x600_png_keeps_its_size() {
    let tmp = TempDir::new().unwrap();
    let source = write_image(tmp.path(), "scene.png", 800, 600, ImageFormat::Png);
    let out = tmp.path().join("out");

    let backend = RustBackend::new();
    let mut session = Session::new(output_spec(OutputFormat::Png, false), DimensionLocks::default(), false);
    session.acquire_paths(&backend, &[source]);

    let mut sink = DirectorySink::new(&out);
    let outcome = session.convert_all(&backend, &mut sink, None).unwrap();
    assert!(matches!(outcome, ConvertOutcome::Finished(ref s) if s.converted == 1));

    let written = out.join("scene_converted.png");
    let bytes = std::fs::read(&written).unwrap();
    assert!(!bytes.is_empty());
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));
}

#[test]
fn three_images_archive_in_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let paths = vec![
        write_image(tmp.path(), "c-first.png", 30, 20, ImageFormat::Png),
        write_image(tmp.path(), "a-second.jpg", 40, 30, ImageFormat::Jpeg),
        write_image(tmp.path(), "b-third.bmp", 50, 25, ImageFormat::Bmp),
    ];
    let out = tmp.path().join("out");

    let backend = RustBackend::new();
    let mut session = Session::new(output_spec(OutputFormat::Jpeg, true), DimensionLocks::default(), true);
    let report = session.acquire_paths(&backend, &paths);
    assert_eq!(report.added, 3);

    let mut sink = DirectorySink::new(&out);
    session.convert_all(&backend, &mut sink, None).unwrap();

    let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
    assert_eq!(files.len(), 1, "exactly one delivered file");

    let archive = std::fs::read(out.join("converted_images.zip")).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["c-first.jpg", "a-second.jpg", "b-third.jpg"]);

    let mut entry = Vec::new();
    zip.by_name("b-third.jpg")
        .unwrap()
        .read_to_end(&mut entry)
        .unwrap();
    let decoded = image::load_from_memory(&entry).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (50, 25));
}

#[test]
fn unsupported_file_in_batch_of_five() {
    let tmp = TempDir::new().unwrap();
    let mut paths: Vec<PathBuf> = (0..4)
        .map(|i| write_image(tmp.path(), &format!("p{i}.png"), 8, 8, ImageFormat::Png))
        .collect();
    let doc = tmp.path().join("readme.pdf");
    std::fs::write(&doc, b"%PDF-1.4").unwrap();
    paths.push(doc);

    let backend = RustBackend::new();
    let mut session = Session::new(output_spec(OutputFormat::Png, false), DimensionLocks::default(), true);
    let report = session.acquire_paths(&backend, &paths);

    assert_eq!(session.queue().len(), 4);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(
        pixbatch::output::format_acquire_report(&report)[1],
        "Skipped 1 unsupported file"
    );
}

#[test]
fn width_lock_with_ratio_recomputes_per_keystroke() {
    let tmp = TempDir::new().unwrap();
    let source = write_image(tmp.path(), "wide.png", 1920, 1080, ImageFormat::Png);

    let backend = RustBackend::new();
    let mut session = Session::default();
    session.acquire_paths(&backend, &[source]);
    session.set_locks(DimensionLocks::new(true, false, true));

    let heights: Vec<u32> = ["1", "12", "128", "1280"]
        .iter()
        .filter_map(|text| session.set_width_input(*text))
        .map(|d| d.height)
        .collect();
    // 1920/1080 = 16/9
    assert_eq!(heights, vec![1, 7, 72, 720]);
}

#[test]
fn remove_keeps_relative_order() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| write_image(tmp.path(), &format!("{n}.png"), 4, 4, ImageFormat::Png))
        .collect();

    let backend = RustBackend::new();
    let mut session = Session::new(output_spec(OutputFormat::Png, false), DimensionLocks::default(), true);
    session.acquire_paths(&backend, &paths);
    session.remove(1).unwrap();
    session.remove(2).unwrap();

    let names: Vec<&str> = session.queue().iter().map(|q| q.display_name()).collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn jpeg_output_flattens_transparency() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("overlay.png");
    RgbaImage::from_pixel(16, 16, Rgba([10, 200, 30, 0]))
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();

    let backend = RustBackend::new();
    let mut session = Session::new(output_spec(OutputFormat::Jpeg, false), DimensionLocks::default(), false);
    session.acquire_paths(&backend, &[path]);

    let mut sink = MemorySink::default();
    session.convert_all(&backend, &mut sink, None).unwrap();
    let decoded = image::load_from_memory(&sink.files[0].bytes).unwrap();
    assert!(!decoded.color().has_alpha());
}

#[test]
fn config_file_drives_session_defaults() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join(config::CONFIG_FILE);
    std::fs::write(
        &config_path,
        r#"
[output]
format = "webp"
archive = true
archive_name = "bundle.zip"

[acquire]
batch = true
"#,
    )
    .unwrap();
    let cfg: PixbatchConfig = config::load_config(&config_path).unwrap();

    let paths: Vec<PathBuf> = ["x", "y"]
        .iter()
        .map(|n| write_image(tmp.path(), &format!("{n}.png"), 6, 6, ImageFormat::Png))
        .collect();

    let backend = RustBackend::new();
    let mut session = Session::new(
        cfg.output.output_spec(),
        cfg.dimensions.locks(),
        cfg.acquire.batch,
    )
    .with_archive_name(&cfg.output.archive_name);
    session.acquire_paths(&backend, &paths);

    let mut sink = MemorySink::default();
    session.convert_all(&backend, &mut sink, None).unwrap();
    assert_eq!(sink.files.len(), 1);
    assert_eq!(sink.files[0].name, "bundle.zip");
}
