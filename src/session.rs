//! Interactive state for the batch converter.
//!
//! A [`Session`] owns everything the user can change between conversions:
//! the image queue, the dimension locks, the raw text of the width and height
//! inputs, the output format/quality/archive choice and the batch flag.
//!
//! Editing the width or height text immediately returns the resolved size of
//! the previewed image (the first in the queue); there is no separate confirm
//! step. [`Session::convert_all`] plans every queued image against the same
//! inputs, encodes them in parallel, waits for all of them, and only then
//! hands the results to the packager.
//!
//! A conversion marks the session busy for its whole duration. A second
//! request while busy returns [`ConvertOutcome::Busy`] without doing any work.
//! The flag is held by a guard, so it is cleared however the conversion ends.

use crate::acquire::{
    AcquireError, AcquireReport, Acquirer, ImageQueue, InputChannel, QueuedImage, RawInput,
    inputs_from_paths,
};
use crate::clipboard::{ClipboardError, ClipboardSource};
use crate::imaging::{
    DimensionLocks, Dimensions, ImageBackend, OutputFormat, OutputSpec, SizeFields, Transcoders,
    convert_all, plan_conversion,
};
use crate::naming::{CLIPBOARD_NAME, DEFAULT_ARCHIVE_NAME, Delivery, output_filename};
use crate::package::{DownloadSink, OutputFile, PackageError, PackageReport, package};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("Processing failed: {0}")]
    Package(#[from] PackageError),
}

/// Progress reported while a conversion runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertEvent {
    Started {
        count: usize,
        format: OutputFormat,
    },
    ImageConverted {
        index: usize,
        name: String,
        filename: String,
        dimensions: Dimensions,
        bytes: usize,
    },
    ImageFailed {
        index: usize,
        name: String,
    },
}

/// Totals for a finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub converted: usize,
    pub failed: Vec<String>,
    pub package: PackageReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// Another conversion is in progress; nothing was done.
    Busy,
    /// The queue is empty.
    NothingToConvert,
    Finished(ConvertSummary),
}

/// Clears the busy flag when dropped.
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Session {
    queue: ImageQueue,
    locks: DimensionLocks,
    fields: SizeFields,
    output: OutputSpec,
    archive_name: String,
    batch: bool,
    transcoders: Transcoders,
    busy: AtomicBool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(OutputSpec::default(), DimensionLocks::default(), false)
    }
}

impl Session {
    pub fn new(output: OutputSpec, locks: DimensionLocks, batch: bool) -> Self {
        Self {
            queue: ImageQueue::new(),
            locks,
            fields: SizeFields::default(),
            output,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            batch,
            transcoders: Transcoders::standard(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    pub fn with_transcoders(mut self, transcoders: Transcoders) -> Self {
        self.transcoders = transcoders;
        self
    }

    pub fn queue(&self) -> &ImageQueue {
        &self.queue
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the busy flag, or `None` if a conversion already holds it.
    pub fn begin_work(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    // ------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------

    /// Queue files and directories.
    pub fn acquire_paths(&mut self, backend: &impl ImageBackend, paths: &[PathBuf]) -> AcquireReport {
        let inputs = inputs_from_paths(paths);
        self.acquire(backend, inputs)
    }

    /// Queue the clipboard image as `pasted-image`.
    pub fn acquire_clipboard(
        &mut self,
        backend: &impl ImageBackend,
        source: &mut dyn ClipboardSource,
    ) -> Result<AcquireReport, SessionError> {
        let image = source.read_image()?.ok_or(ClipboardError::NoImage)?;
        let png = image.into_png()?;
        let input =
            RawInput::from_bytes(CLIPBOARD_NAME, InputChannel::Clipboard, png).with_extension("png");
        Ok(self.acquire(backend, vec![input]))
    }

    fn acquire(&mut self, backend: &impl ImageBackend, inputs: Vec<RawInput>) -> AcquireReport {
        let acquirer = Acquirer::new(backend, &self.transcoders);
        acquirer.acquire(&mut self.queue, inputs, self.batch)
    }

    pub fn remove(&mut self, index: usize) -> Result<QueuedImage, SessionError> {
        Ok(self.queue.remove(index)?)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    // ------------------------------------------------------------------
    // Dimensions
    // ------------------------------------------------------------------

    pub fn set_locks(&mut self, locks: DimensionLocks) -> Option<Dimensions> {
        self.locks = locks;
        self.preview_dimensions()
    }

    /// Replace the width text and return the previewed image's new size.
    pub fn set_width_input(&mut self, text: impl Into<String>) -> Option<Dimensions> {
        self.fields.width = text.into();
        self.preview_dimensions()
    }

    /// Replace the height text and return the previewed image's new size.
    pub fn set_height_input(&mut self, text: impl Into<String>) -> Option<Dimensions> {
        self.fields.height = text.into();
        self.preview_dimensions()
    }

    /// Resolved size of the first queued image.
    pub fn preview_dimensions(&self) -> Option<Dimensions> {
        self.queue.get(0).map(|item| self.plan(item).0)
    }

    /// Resolved size of every queued image, in queue order.
    pub fn planned_dimensions(&self) -> Vec<(String, Dimensions)> {
        self.queue
            .iter()
            .map(|item| (item.display_name().to_string(), self.plan(item).0))
            .collect()
    }

    fn plan(&self, item: &QueuedImage) -> (Dimensions, crate::imaging::EncodeParams) {
        let params = plan_conversion(item.original(), self.locks, &self.fields, &self.output);
        (
            Dimensions {
                width: params.width,
                height: params.height,
            },
            params,
        )
    }

    // ------------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------------

    /// Convert every queued image and hand the results to `sink`.
    ///
    /// Images that fail to encode are reported and left out; the rest are
    /// still delivered.
    pub fn convert_all(
        &self,
        backend: &impl ImageBackend,
        sink: &mut dyn DownloadSink,
        events: Option<&Sender<ConvertEvent>>,
    ) -> Result<ConvertOutcome, SessionError> {
        let Some(_guard) = self.begin_work() else {
            log::debug!("conversion requested while busy");
            return Ok(ConvertOutcome::Busy);
        };
        if self.queue.is_empty() {
            return Ok(ConvertOutcome::NothingToConvert);
        }

        let emit = |event: ConvertEvent| {
            if let Some(tx) = events {
                tx.send(event).ok();
            }
        };
        emit(ConvertEvent::Started {
            count: self.queue.len(),
            format: self.output.format,
        });

        let jobs: Vec<_> = self
            .queue
            .iter()
            .map(|item| (item.decoded(), self.plan(item).1))
            .collect();
        let results = convert_all(backend, &jobs);

        let delivery = if self.queue.len() == 1 {
            Delivery::Single
        } else {
            Delivery::Batch
        };

        let mut outputs = Vec::new();
        let mut failed = Vec::new();
        for (index, ((item, result), (_, params))) in
            self.queue.iter().zip(results).zip(&jobs).enumerate()
        {
            let name = item.display_name().to_string();
            match result {
                Some(bytes) => {
                    let filename = output_filename(&name, self.output.format, delivery);
                    emit(ConvertEvent::ImageConverted {
                        index: index + 1,
                        name,
                        filename: filename.clone(),
                        dimensions: Dimensions {
                            width: params.width,
                            height: params.height,
                        },
                        bytes: bytes.len(),
                    });
                    outputs.push(OutputFile::new(filename, bytes));
                }
                None => {
                    emit(ConvertEvent::ImageFailed {
                        index: index + 1,
                        name: name.clone(),
                    });
                    failed.push(name);
                }
            }
        }

        let converted = outputs.len();
        let archive = self.output.archive.then_some(self.archive_name.as_str());
        let report = package(outputs, archive, sink)?;

        Ok(ConvertOutcome::Finished(ConvertSummary {
            converted,
            failed,
            package: report,
        }))
    }
}
