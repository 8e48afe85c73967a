//! Delivery of converted files: one file per output, or a single zip archive.
//!
//! A [`DownloadSink`] receives finished files. [`DirectorySink`] writes them
//! into an output directory; each write goes to a temporary file in the same
//! directory which is then renamed over the target, so an interrupted write
//! never leaves a truncated image behind.
//!
//! When an archive is requested and there is more than one output, the zip is
//! built entirely in memory before anything reaches the sink. An archive that
//! fails to build delivers nothing.

use serde::Serialize;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not build archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// A finished file ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Somewhere finished files go.
pub trait DownloadSink {
    /// Deliver one file. Returns a human-readable location.
    fn deliver(&mut self, file: &OutputFile) -> Result<String, PackageError>;
}

/// Writes delivered files into a directory, overwriting same-named files.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, file: &OutputFile) -> Result<String, PackageError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(&file.name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&file.bytes)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        log::debug!("wrote {} ({} bytes)", target.display(), file.bytes.len());
        Ok(target.display().to_string())
    }
}

/// Keeps delivered files in memory. Used by tests and by callers that post-process.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub files: Vec<OutputFile>,
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, file: &OutputFile) -> Result<String, PackageError> {
        self.files.push(file.clone());
        Ok(file.name.clone())
    }
}

/// A delivery that did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub name: String,
    pub reason: String,
}

/// What a packaging step delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    /// Locations of delivered files, in delivery order.
    pub delivered: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
    /// Number of entries inside the archive, when one was delivered.
    pub archived: Option<usize>,
}

/// Build a deflate zip holding `outputs` in order.
pub fn build_archive(outputs: &[OutputFile]) -> Result<Vec<u8>, PackageError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for file in outputs {
        zip.start_file(file.name.as_str(), options)?;
        zip.write_all(&file.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Deliver `outputs` to `sink`.
///
/// With `archive` set to a filename and more than one output, a single zip of
/// that name is delivered. Otherwise each output is delivered on its own in
/// order; a failed delivery is recorded and the rest still go out.
pub fn package(
    outputs: Vec<OutputFile>,
    archive: Option<&str>,
    sink: &mut dyn DownloadSink,
) -> Result<PackageReport, PackageError> {
    let mut report = PackageReport::default();

    if let Some(archive_name) = archive.filter(|_| outputs.len() > 1) {
        let bytes = build_archive(&outputs)?;
        let location = sink.deliver(&OutputFile::new(archive_name, bytes))?;
        report.delivered.push(location);
        report.archived = Some(outputs.len());
        return Ok(report);
    }

    for file in &outputs {
        match sink.deliver(file) {
            Ok(location) => report.delivered.push(location),
            Err(e) => {
                log::warn!("could not deliver {}: {}", file.name, e);
                report.failed.push(DeliveryFailure {
                    name: file.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn outputs(names: &[&str]) -> Vec<OutputFile> {
        names
            .iter()
            .map(|n| OutputFile::new(*n, format!("bytes of {n}").into_bytes()))
            .collect()
    }

    /// Fails for one named file.
    struct FlakySink {
        fail_on: &'static str,
        inner: MemorySink,
    }

    impl DownloadSink for FlakySink {
        fn deliver(&mut self, file: &OutputFile) -> Result<String, PackageError> {
            if file.name == self.fail_on {
                return Err(PackageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.deliver(file)
        }
    }

    #[test]
    fn archive_holds_entries_in_order() {
        let mut sink = MemorySink::default();
        let report = package(
            outputs(&["a.png", "b.png", "c.png"]),
            Some("converted_images.zip"),
            &mut sink,
        )
        .unwrap();

        assert_eq!(report.archived, Some(3));
        assert_eq!(sink.files.len(), 1);
        assert_eq!(sink.files[0].name, "converted_images.zip");

        let mut zip = zip::ZipArchive::new(Cursor::new(sink.files[0].bytes.clone())).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);

        let mut content = String::new();
        zip.by_name("b.png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "bytes of b.png");
    }

    #[test]
    fn archive_ignored_for_single_output() {
        let mut sink = MemorySink::default();
        let report = package(outputs(&["only.png"]), Some("x.zip"), &mut sink).unwrap();
        assert_eq!(report.archived, None);
        assert_eq!(sink.files, outputs(&["only.png"]));
    }

    #[test]
    fn individual_delivery_in_order() {
        let mut sink = MemorySink::default();
        let report = package(outputs(&["1.jpg", "2.jpg"]), None, &mut sink).unwrap();
        assert_eq!(report.delivered, vec!["1.jpg", "2.jpg"]);
        assert_eq!(sink.files.len(), 2);
    }

    #[test]
    fn failed_delivery_does_not_stop_the_rest() {
        let mut sink = FlakySink {
            fail_on: "2.jpg",
            inner: MemorySink::default(),
        };
        let report = package(outputs(&["1.jpg", "2.jpg", "3.jpg"]), None, &mut sink).unwrap();
        assert_eq!(report.delivered, vec!["1.jpg", "3.jpg"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "2.jpg");
    }

    #[test]
    fn failed_archive_delivery_is_an_error() {
        let mut sink = FlakySink {
            fail_on: "all.zip",
            inner: MemorySink::default(),
        };
        let result = package(outputs(&["a", "b"]), Some("all.zip"), &mut sink);
        assert!(result.is_err());
        assert!(sink.inner.files.is_empty());
    }

    #[test]
    fn empty_outputs_deliver_nothing() {
        let mut sink = MemorySink::default();
        let report = package(Vec::new(), Some("x.zip"), &mut sink).unwrap();
        assert!(report.delivered.is_empty());
        assert!(sink.files.is_empty());
    }

    #[test]
    fn directory_sink_writes_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let mut sink = DirectorySink::new(&out);

        sink.deliver(&OutputFile::new("x.png", b"first".to_vec()))
            .unwrap();
        let location = sink
            .deliver(&OutputFile::new("x.png", b"second".to_vec()))
            .unwrap();

        assert_eq!(location, out.join("x.png").display().to_string());
        assert_eq!(std::fs::read(out.join("x.png")).unwrap(), b"second");
        let entries = std::fs::read_dir(&out).unwrap().count();
        assert_eq!(entries, 1, "no temp files left behind");
    }
}
