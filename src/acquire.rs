//! Image acquisition: turning files and clipboard contents into queue entries.
//!
//! Every input channel (paths on the command line, directories, the system
//! clipboard) is normalised into a [`RawInput`] and then run through the same
//! pipeline:
//!
//! ```text
//! RawInput ──classify──▶ accepted ──(transcode)──▶ decode ──▶ QueuedImage
//!              │                         │            │
//!              ▼                         ▼            ▼
//!        skipped (count)            failed (reason)  failed (reason)
//! ```
//!
//! Classification is by extension when there is one, otherwise by sniffing
//! the file signature with `infer`. Legacy photo formats go through a
//! [`Transcoder`](crate::imaging::Transcoder) first. A failure on one input
//! never aborts the others; the [`AcquireReport`] lists what happened to each.
//!
//! Decoding of a multi-input acquisition runs on the rayon pool and is joined
//! before the queue is touched, so the queue only ever changes on the calling
//! thread.

use crate::imaging::rust_backend::native_input_extensions;
use crate::imaging::transcode::{LEGACY_EXTENSIONS, is_legacy_extension};
use crate::imaging::{BackendError, Dimensions, ImageBackend, Transcoders};
use crate::naming::{display_name, extension_of};
use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a supported image type")]
    Unsupported,
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("no image at index {index} (queue has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Every extension the acquirer accepts.
pub fn accepted_extensions() -> Vec<&'static str> {
    let mut exts = native_input_extensions().to_vec();
    exts.extend_from_slice(LEGACY_EXTENSIONS);
    exts
}

fn is_accepted(ext: &str) -> bool {
    accepted_extensions()
        .iter()
        .any(|a| a.eq_ignore_ascii_case(ext))
}

/// Where an input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputChannel {
    Clipboard,
    File,
}

#[derive(Debug, Clone)]
enum Payload {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// One not-yet-decoded input.
#[derive(Debug, Clone)]
pub struct RawInput {
    pub name: String,
    pub channel: InputChannel,
    ext: Option<String>,
    payload: Payload,
}

impl RawInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            channel: InputChannel::File,
            ext: extension_of(&path),
            payload: Payload::Path(path),
        }
    }

    /// Bytes without a filename; the type is sniffed from the signature.
    pub fn from_bytes(name: impl Into<String>, channel: InputChannel, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            channel,
            ext: None,
            payload: Payload::Bytes(bytes.into()),
        }
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.ext = Some(ext.to_ascii_lowercase());
        self
    }

    fn read(&self) -> Result<Arc<[u8]>, AcquireError> {
        match &self.payload {
            Payload::Path(path) => Ok(std::fs::read(path)?.into()),
            Payload::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }
}

/// Expand paths into inputs. Directories are walked recursively in path order.
pub fn inputs_from_paths(paths: &[PathBuf]) -> Vec<RawInput> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            files.sort();
            inputs.extend(files.into_iter().map(RawInput::from_path));
        } else {
            inputs.push(RawInput::from_path(path.clone()));
        }
    }
    inputs
}

/// Sniff a signature and return the canonical extension for image payloads.
fn sniff_extension(bytes: &[u8]) -> Option<String> {
    infer::get(bytes)
        .filter(|t| t.matcher_type() == infer::MatcherType::Image)
        .map(|t| t.extension().to_ascii_lowercase())
}

/// The image type of an accepted input.
///
/// Holds the payload when it had to be read for sniffing, so decoding does
/// not read it a second time.
#[derive(Debug, Clone)]
pub struct Classified {
    ext: String,
    bytes: Option<Arc<[u8]>>,
}

impl Classified {
    /// Canonical lowercase extension, e.g. `png` or `avif`.
    pub fn extension(&self) -> &str {
        &self.ext
    }
}

/// Determine the input's image type, or reject it with [`AcquireError::Unsupported`].
///
/// An extension decides without touching the payload. Inputs without one are
/// read and sniffed.
pub fn classify(input: &RawInput) -> Result<Classified, AcquireError> {
    if let Some(ext) = &input.ext {
        return if is_accepted(ext) {
            Ok(Classified {
                ext: ext.clone(),
                bytes: None,
            })
        } else {
            Err(AcquireError::Unsupported)
        };
    }
    let bytes = input.read()?;
    match sniff_extension(&bytes) {
        Some(ext) if is_accepted(&ext) => Ok(Classified {
            ext,
            bytes: Some(bytes),
        }),
        _ => Err(AcquireError::Unsupported),
    }
}

/// One image in the queue.
///
/// Only constructed from a successful decode, so both dimensions are > 0.
#[derive(Debug, Clone)]
pub struct QueuedImage {
    id: u64,
    display_name: String,
    channel: InputChannel,
    source_bytes: Arc<[u8]>,
    decoded: Arc<DynamicImage>,
    original: Dimensions,
}

impl QueuedImage {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn channel(&self) -> InputChannel {
        self.channel
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    pub fn decoded(&self) -> &DynamicImage {
        &self.decoded
    }

    pub fn original(&self) -> Dimensions {
        self.original
    }
}

/// A decoded input waiting to be queued.
#[derive(Debug)]
pub struct DecodedInput {
    name: String,
    channel: InputChannel,
    source_bytes: Arc<[u8]>,
    decoded: DynamicImage,
}

impl DecodedInput {
    pub fn into_image(self) -> DynamicImage {
        self.decoded
    }
}

/// Ordered images awaiting conversion. Insertion order is display order.
#[derive(Debug, Default)]
pub struct ImageQueue {
    items: Vec<QueuedImage>,
    next_id: u64,
}

impl ImageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded input; returns the new entry's identity.
    pub fn push(&mut self, input: DecodedInput) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let original = Dimensions::of(&input.decoded);
        self.items.push(QueuedImage {
            id,
            display_name: input.name,
            channel: input.channel,
            source_bytes: input.source_bytes,
            decoded: Arc::new(input.decoded),
            original,
        });
        id
    }

    /// Remove the entry at `index`, keeping the relative order of the rest.
    pub fn remove(&mut self, index: usize) -> Result<QueuedImage, AcquireError> {
        if index >= self.items.len() {
            return Err(AcquireError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueuedImage> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueuedImage> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a ImageQueue {
    type Item = &'a QueuedImage;
    type IntoIter = std::slice::Iter<'a, QueuedImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// An input that could not be queued, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquireFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of one acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquireReport {
    /// Entries appended to the queue.
    pub added: usize,
    /// Inputs rejected because they are not an accepted image type.
    pub skipped: Vec<String>,
    /// Accepted inputs that could not be read, transcoded, or decoded.
    pub failed: Vec<AcquireFailure>,
    /// Inputs after the first accepted one, left unread in single-image mode.
    pub ignored: usize,
    /// The previous queue contents were replaced.
    pub replaced: bool,
}

impl AcquireReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Turns raw inputs into queue entries.
pub struct Acquirer<'a, B: ImageBackend> {
    backend: &'a B,
    transcoders: &'a Transcoders,
}

impl<'a, B: ImageBackend> Acquirer<'a, B> {
    pub fn new(backend: &'a B, transcoders: &'a Transcoders) -> Self {
        Self {
            backend,
            transcoders,
        }
    }

    /// Classify, decode, and queue `inputs`.
    ///
    /// In batch mode every decoded input is appended. Otherwise only the
    /// first accepted input is considered, and when it decodes it replaces
    /// the whole queue.
    pub fn acquire(
        &self,
        queue: &mut ImageQueue,
        inputs: Vec<RawInput>,
        batch: bool,
    ) -> AcquireReport {
        let mut report = AcquireReport::default();

        let mut accepted = Vec::new();
        for input in inputs {
            if !batch && !accepted.is_empty() {
                // Only the extension is checked; payloads are not read.
                match &input.ext {
                    Some(ext) if !is_accepted(ext) => report.skipped.push(input.name),
                    _ => report.ignored += 1,
                }
                continue;
            }
            match classify(&input) {
                Ok(classified) => accepted.push((input, classified)),
                Err(AcquireError::Unsupported) => {
                    log::info!("skipping unsupported input {}", input.name);
                    report.skipped.push(input.name);
                }
                Err(e) => report.failed.push(AcquireFailure {
                    name: input.name,
                    reason: e.to_string(),
                }),
            }
        }

        let decoded: Vec<Result<DecodedInput, AcquireFailure>> = accepted
            .par_iter()
            .map(|(input, classified)| {
                self.decode(input, classified).map_err(|e| {
                    log::warn!("dropping {}: {}", input.name, e);
                    AcquireFailure {
                        name: input.name.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect();

        for result in decoded {
            match result {
                Ok(input) => {
                    if !batch {
                        report.replaced = !queue.is_empty();
                        queue.clear();
                    }
                    queue.push(input);
                    report.added += 1;
                }
                Err(failure) => report.failed.push(failure),
            }
        }

        report
    }

    /// Decode one classified input, transcoding legacy formats first.
    pub fn decode(
        &self,
        input: &RawInput,
        classified: &Classified,
    ) -> Result<DecodedInput, AcquireError> {
        let ext = classified.extension();
        let source_bytes = match &classified.bytes {
            Some(bytes) => Arc::clone(bytes),
            None => input.read()?,
        };
        let decoded = if is_legacy_extension(ext) {
            let intermediate = self.transcoders.transcode(ext, &source_bytes)?;
            self.backend.decode(&intermediate)?
        } else {
            self.backend.decode(&source_bytes)?
        };
        Ok(DecodedInput {
            name: input.name.clone(),
            channel: input.channel,
            source_bytes,
            decoded,
        })
    }
}

/// Convenience wrapper for a single path.
pub fn acquire_path(
    acquirer: &Acquirer<'_, impl ImageBackend>,
    queue: &mut ImageQueue,
    path: &Path,
    batch: bool,
) -> AcquireReport {
    acquirer.acquire(queue, vec![RawInput::from_path(path)], batch)
}
