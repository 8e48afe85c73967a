//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Decode (AVIF) | not here: see [`transcode`](super::transcode) |
//! | Resize | `DynamicImage::resize_exact` with `CatmullRom` (bicubic) |
//! | Encode → PNG / BMP / TIFF | `image` codecs, lossless |
//! | Encode → JPEG | `JpegEncoder::new_with_quality`, alpha dropped |
//! | Encode → WebP | `WebPEncoder::new_lossless` |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, ImageBackend};
use super::params::{EncodeParams, OutputFormat};
use image::codecs::avif::AvifEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions the `image` crate can decode directly.
const NATIVE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static NATIVE_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    NATIVE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Extensions whose decoders are compiled in.
pub fn native_input_extensions() -> &'static [&'static str] {
    &NATIVE_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    filter: FilterType,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            filter: FilterType::CatmullRom,
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert to a pixel layout the target encoder accepts.
///
/// JPEG has no alpha channel; everything else keeps alpha when present.
/// 16-bit and float sources are narrowed to 8 bits per channel.
fn to_encodable(img: DynamicImage, format: OutputFormat) -> DynamicImage {
    let keep_alpha = format != OutputFormat::Jpeg && img.color().has_alpha();
    if keep_alpha {
        if matches!(img, DynamicImage::ImageRgba8(_)) {
            img
        } else {
            DynamicImage::ImageRgba8(img.to_rgba8())
        }
    } else if matches!(img, DynamicImage::ImageRgb8(_)) {
        img
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn encode_to_vec(img: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
    let mut cursor = Cursor::new(Vec::new());
    let quality = params.quality.percent();
    let result = match params.format {
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut cursor)),
        OutputFormat::Jpeg => {
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, quality))
        }
        OutputFormat::Webp => img.write_with_encoder(WebPEncoder::new_lossless(&mut cursor)),
        OutputFormat::Avif => img.write_with_encoder(AvifEncoder::new_with_speed_quality(
            &mut cursor,
            6,
            quality,
        )),
        OutputFormat::Bmp => img.write_with_encoder(BmpEncoder::new(&mut cursor)),
        OutputFormat::Tiff => img.write_with_encoder(TiffEncoder::new(&mut cursor)),
    };
    result.map_err(|e| {
        BackendError::EncodeFailed(format!("{} encode failed: {}", params.format, e))
    })?;

    let bytes = cursor.into_inner();
    if bytes.is_empty() {
        return Err(BackendError::EncodeFailed(format!(
            "{} encoder produced no data",
            params.format
        )));
    }
    Ok(bytes)
}

/// Fallback allocation ceiling when the decoder limits carry none.
const DEFAULT_MAX_ALLOC: u64 = 512 * 1024 * 1024;

/// Refuse targets whose pixel buffers would exceed the decoder's allocation limit.
///
/// Resizing holds a `source width × target height` RGBA f32 intermediate
/// alongside the 8-bit RGBA output, so both are checked.
fn check_target_size(image: &DynamicImage, params: &EncodeParams) -> Result<(), BackendError> {
    let max_alloc = image::Limits::default()
        .max_alloc
        .unwrap_or(DEFAULT_MAX_ALLOC);
    let output = params.width as u64 * params.height as u64 * 4;
    let intermediate = image.width() as u64 * params.height as u64 * 16;
    if output.max(intermediate) > max_alloc {
        return Err(BackendError::EncodeFailed(format!(
            "{}x{} is too large to encode",
            params.width, params.height
        )));
    }
    Ok(())
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| BackendError::DecodeFailed(e.to_string()))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(BackendError::DecodeFailed("image has no pixels".into()));
        }
        Ok(img)
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let resized = if image.width() == params.width && image.height() == params.height {
            image.clone()
        } else {
            check_target_size(image, params)?;
            image.resize_exact(params.width, params.height, self.filter)
        };
        encode_to_vec(&to_encodable(resized, params.format), params)
    }
}
