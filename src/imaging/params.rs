//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what each output should look like) and the
//! [`backend`](super::backend) (which does the actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a fraction in `[0, 1]`. Clamped on construction.
//! - [`OutputFormat`]: The fixed set of encodable output formats.
//! - [`OutputSpec`]: Format + quality + "aggregate into archive" flag chosen by the user.
//! - [`EncodeParams`]: Full specification for one conversion: target size, format, quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding, as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "f32", from = "f32")]
pub struct Quality(f32);

impl Quality {
    /// Quality used by the clipboard paste tool for lossy formats.
    pub const PASTE: Quality = Quality(0.92);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1-100 scale the `image` crate encoders expect.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).max(1)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.9)
    }
}

impl From<f32> for Quality {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for f32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Output formats the converter can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Avif,
    Bmp,
    Tiff,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Webp,
        OutputFormat::Avif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// File extension: `jpeg` maps to `jpg`, every other format keeps its name.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            other => other.name(),
        }
    }

    /// Whether the encoder honours a quality setting.
    ///
    /// The pure-Rust WebP encoder is lossless only, so WebP ignores quality.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Avif)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = OutputFormat::ALL.iter().map(|f| f.name()).collect();
        write!(
            f,
            "unknown output format '{}' (expected one of: {})",
            self.0,
            names.join(", ")
        )
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            "bmp" => Ok(OutputFormat::Bmp),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// What the user asked the converter to produce.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutputSpec {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Bundle all outputs into one zip. Only takes effect with more than one output.
    pub archive: bool,
}

/// Parameters for converting one decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(-0.5).value(), 0.0);
        assert_eq!(Quality::new(0.5).value(), 0.5);
        assert_eq!(Quality::new(1.5).value(), 1.0);
    }

    #[test]
    fn quality_nan_falls_back_to_default() {
        assert_eq!(Quality::new(f32::NAN), Quality::default());
    }

    #[test]
    fn quality_percent_scale() {
        assert_eq!(Quality::new(0.92).percent(), 92);
        assert_eq!(Quality::new(1.0).percent(), 100);
        assert_eq!(Quality::new(0.0).percent(), 1);
    }

    #[test]
    fn jpeg_extension_is_jpg() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
        assert_eq!(OutputFormat::Tiff.extension(), "tiff");
    }

    #[test]
    fn parse_format_names_and_aliases() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(" tif ".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert!("heic".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn only_jpeg_and_avif_are_lossy() {
        let lossy: Vec<_> = OutputFormat::ALL.iter().filter(|f| f.is_lossy()).collect();
        assert_eq!(lossy, vec![&OutputFormat::Jpeg, &OutputFormat::Avif]);
    }
}
