//! Centralized naming for queued images and delivered files.
//!
//! Every input gets a *display name*: its filename without the extension. The
//! display name is what the user sees in listings and what output filenames
//! are derived from:
//!
//! - `holiday.final.JPG` → display name `holiday.final`
//! - a single converted file → `holiday.final_converted.png`
//! - the same image inside a multi-image run → `holiday.final.png`
//!
//! Two inputs with the same stem produce the same output name. No
//! deduplication is attempted; the later file wins when written to disk.

use crate::imaging::OutputFormat;
use std::path::Path;

/// Display name used for images read from the clipboard.
pub const CLIPBOARD_NAME: &str = "pasted-image";

/// Filename of the zip produced for multi-image runs.
pub const DEFAULT_ARCHIVE_NAME: &str = "converted_images.zip";

/// Derive the display name for an input path.
///
/// Falls back to `"image"` when the path has no usable stem (e.g. `".png"`).
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty() && !s.starts_with('.'))
        .unwrap_or_else(|| "image".to_string())
}

/// Lowercased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// How an output file will be delivered, which decides its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The only output of the run, delivered on its own.
    Single,
    /// One of several outputs, delivered individually or inside an archive.
    Batch,
}

/// Build the output filename for an image.
///
/// ```
/// # use pixbatch::naming::{output_filename, Delivery};
/// # use pixbatch::imaging::OutputFormat;
/// assert_eq!(output_filename("cat", OutputFormat::Jpeg, Delivery::Single), "cat_converted.jpg");
/// assert_eq!(output_filename("cat", OutputFormat::Webp, Delivery::Batch), "cat.webp");
/// ```
pub fn output_filename(stem: &str, format: OutputFormat, delivery: Delivery) -> String {
    match delivery {
        Delivery::Single => format!("{}_converted.{}", stem, format.extension()),
        Delivery::Batch => format!("{}.{}", stem, format.extension()),
    }
}

/// Filename written by the clipboard paste tool.
pub fn pasted_filename(format: OutputFormat) -> String {
    format!("{}.{}", CLIPBOARD_NAME, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_extension() {
        assert_eq!(display_name(Path::new("photos/dawn.jpg")), "dawn");
    }

    #[test]
    fn display_name_keeps_inner_dots() {
        assert_eq!(display_name(Path::new("holiday.final.JPG")), "holiday.final");
    }

    #[test]
    fn display_name_without_extension() {
        assert_eq!(display_name(Path::new("scan")), "scan");
    }

    #[test]
    fn display_name_fallback() {
        assert_eq!(display_name(Path::new("/")), "image");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of(Path::new("A.HEIC")), Some("heic".to_string()));
        assert_eq!(extension_of(Path::new("noext")), None);
    }

    #[test]
    fn single_output_gets_converted_suffix() {
        assert_eq!(
            output_filename("dawn", OutputFormat::Png, Delivery::Single),
            "dawn_converted.png"
        );
    }

    #[test]
    fn batch_output_keeps_stem() {
        assert_eq!(
            output_filename("dawn", OutputFormat::Jpeg, Delivery::Batch),
            "dawn.jpg"
        );
    }

    #[test]
    fn pasted_filename_maps_jpeg() {
        assert_eq!(pasted_filename(OutputFormat::Jpeg), "pasted-image.jpg");
        assert_eq!(pasted_filename(OutputFormat::Png), "pasted-image.png");
    }
}
