//! Clipboard access and the paste tool.
//!
//! [`ClipboardSource`] abstracts the system clipboard so the rest of the crate
//! (and its tests) never talk to `arboard` directly. An empty clipboard is not
//! an error: `read_image` returns `Ok(None)` and callers show a notice.
//!
//! The paste tool ([`paste`]) takes one image from the clipboard or from a
//! file and saves it as `pasted-image.<ext>` at its natural size.

use crate::acquire::{AcquireError, Acquirer, RawInput, classify};
use crate::imaging::{Dimensions, EncodeParams, ImageBackend, OutputFormat, Quality, Transcoders};
use crate::naming::pasted_filename;
use crate::package::{DownloadSink, OutputFile, PackageError};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Failed to read clipboard. Please try pressing Ctrl+V or Cmd+V to paste.")]
    Unavailable(String),
    #[error("No image found in clipboard.")]
    NoImage,
    #[error("Please select a valid image file.")]
    NotAnImage(PathBuf),
    #[error("Could not process the image.")]
    Process(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Deliver(#[from] PackageError),
}

impl From<AcquireError> for ClipboardError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Io(e) => ClipboardError::Io(e),
            e => ClipboardError::Process(e.to_string()),
        }
    }
}

/// Raw RGBA pixels as read from the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ClipboardImage {
    pub fn into_image(self) -> Result<DynamicImage, ClipboardError> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Err(ClipboardError::Process(format!(
                "clipboard image has zero size ({width}x{height})"
            )));
        }
        RgbaImage::from_raw(width, height, self.rgba)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| {
                ClipboardError::Process(format!(
                    "pixel buffer does not match {width}x{height}"
                ))
            })
    }

    /// Lossless PNG encoding of the pixels, used as the queued source bytes.
    pub fn into_png(self) -> Result<Vec<u8>, ClipboardError> {
        let image = self.into_image()?;
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| ClipboardError::Process(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Something that can hand over the current clipboard image.
pub trait ClipboardSource {
    /// `Ok(None)` when the clipboard holds no image.
    fn read_image(&mut self) -> Result<Option<ClipboardImage>, ClipboardError>;
}

/// The system clipboard via `arboard`.
pub struct ArboardClipboard {
    inner: arboard::Clipboard,
}

impl ArboardClipboard {
    pub fn open() -> Result<Self, ClipboardError> {
        let inner =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardSource for ArboardClipboard {
    fn read_image(&mut self) -> Result<Option<ClipboardImage>, ClipboardError> {
        match self.inner.get_image() {
            Ok(data) => Ok(Some(ClipboardImage {
                width: data.width as u32,
                height: data.height as u32,
                rgba: data.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => {
                log::debug!("clipboard read failed: {e}");
                Err(ClipboardError::Unavailable(e.to_string()))
            }
        }
    }
}

/// Where the paste tool takes its image from.
pub enum PasteInput<'a> {
    Clipboard(&'a mut dyn ClipboardSource),
    File(PathBuf),
}

/// Result of a successful paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteReport {
    pub filename: String,
    pub location: String,
    pub dimensions: Dimensions,
}

/// Formats the paste tool offers.
pub const PASTE_FORMATS: [OutputFormat; 3] =
    [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Webp];

/// Take one image and save it as `pasted-image.<ext>`.
///
/// Lossy formats use [`Quality::PASTE`]. The image keeps its natural size.
pub fn paste(
    input: PasteInput<'_>,
    backend: &impl ImageBackend,
    format: OutputFormat,
    sink: &mut dyn DownloadSink,
) -> Result<PasteReport, ClipboardError> {
    let image = match input {
        PasteInput::Clipboard(source) => source
            .read_image()?
            .ok_or(ClipboardError::NoImage)?
            .into_image()?,
        PasteInput::File(path) => {
            let input = RawInput::from_path(&path);
            let classified = match classify(&input) {
                Ok(classified) => classified,
                Err(AcquireError::Unsupported) => return Err(ClipboardError::NotAnImage(path)),
                Err(e) => return Err(e.into()),
            };
            let transcoders = Transcoders::standard();
            Acquirer::new(backend, &transcoders)
                .decode(&input, &classified)?
                .into_image()
        }
    };

    let dimensions = Dimensions::of(&image);
    let params = EncodeParams {
        width: dimensions.width,
        height: dimensions.height,
        format,
        quality: Quality::PASTE,
    };
    let bytes = backend
        .encode(&image, &params)
        .map_err(|e| ClipboardError::Process(e.to_string()))?;

    let filename = pasted_filename(format);
    let location = sink.deliver(&OutputFile::new(filename.clone(), bytes))?;
    log::info!("saved pasted image to {location}");
    Ok(PasteReport {
        filename,
        location,
        dimensions,
    })
}
