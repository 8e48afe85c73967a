//! Transcoders for source formats the `image` crate cannot decode.
//!
//! Some photo formats arrive wrapped in HEIF containers that the regular
//! decoders do not understand. Before such a file can join the queue it is
//! re-encoded into plain JPEG bytes by a [`Transcoder`], then decoded like any
//! other input.
//!
//! | Extension | Transcoder |
//! |---|---|
//! | `avif` | [`AvifTranscoder`]: `avif-parse` container + `rav1d` AV1 decode |
//! | `heic`, `heif` | none compiled in; acquisition reports a failure |

use super::backend::BackendError;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Extensions routed through a transcoder instead of a direct decode.
pub const LEGACY_EXTENSIONS: &[&str] = &["avif", "heic", "heif"];

/// JPEG quality for transcoded intermediates.
const INTERMEDIATE_JPEG_QUALITY: u8 = 92;

pub fn is_legacy_extension(ext: &str) -> bool {
    LEGACY_EXTENSIONS
        .iter()
        .any(|legacy| legacy.eq_ignore_ascii_case(ext))
}

/// Re-encodes bytes of a legacy format into a widely decodable lossy format.
pub trait Transcoder: Send + Sync {
    /// Short name used in log lines and failure messages.
    fn name(&self) -> &'static str;

    /// Whether this transcoder handles files with extension `ext` (lowercase).
    fn handles(&self, ext: &str) -> bool;

    /// Produce JPEG bytes from the legacy-format `bytes`.
    fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>, BackendError>;
}

/// The set of transcoders available to the acquirer.
pub struct Transcoders {
    list: Vec<Box<dyn Transcoder>>,
}

impl Transcoders {
    pub fn empty() -> Self {
        Self { list: Vec::new() }
    }

    /// Everything compiled into this build.
    pub fn standard() -> Self {
        Self::empty().with(AvifTranscoder)
    }

    pub fn with(mut self, transcoder: impl Transcoder + 'static) -> Self {
        self.list.push(Box::new(transcoder));
        self
    }

    pub fn find(&self, ext: &str) -> Option<&dyn Transcoder> {
        let ext = ext.to_ascii_lowercase();
        self.list
            .iter()
            .find(|t| t.handles(&ext))
            .map(|t| t.as_ref())
    }

    /// Run the matching transcoder, failing when none is registered.
    pub fn transcode(&self, ext: &str, bytes: &[u8]) -> Result<Vec<u8>, BackendError> {
        let transcoder = self.find(ext).ok_or_else(|| {
            BackendError::TranscodeFailed(format!("no decoder available for .{ext} files"))
        })?;
        log::debug!("transcoding .{} input with {}", ext, transcoder.name());
        transcoder.transcode(bytes)
    }
}

impl Default for Transcoders {
    fn default() -> Self {
        Self::standard()
    }
}

/// AVIF → JPEG via `avif-parse` (container) and `rav1d` (pure Rust dav1d port).
pub struct AvifTranscoder;

impl Transcoder for AvifTranscoder {
    fn name(&self) -> &'static str {
        "avif"
    }

    fn handles(&self, ext: &str) -> bool {
        ext == "avif"
    }

    fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>, BackendError> {
        let (width, height, rgb) = decode_avif_rgb(bytes)?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, INTERMEDIATE_JPEG_QUALITY)
            .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
            .map_err(|e| BackendError::TranscodeFailed(format!("JPEG re-encode failed: {e}")))?;
        Ok(out)
    }
}

fn transcode_err(msg: impl Into<String>) -> BackendError {
    BackendError::TranscodeFailed(msg.into())
}

/// Decode the primary AVIF item into interleaved RGB8.
fn decode_avif_rgb(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| transcode_err(format!("invalid AVIF container: {e:?}")))?;
    let av1: &[u8] = &avif.primary_item;
    if av1.is_empty() {
        return Err(transcode_err("AVIF has no primary image item"));
    }

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr =
        NonNull::new(settings.as_mut_ptr()).ok_or_else(|| transcode_err("settings alloc"))?;
    unsafe { dav1d::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(transcode_err(format!("rav1d open failed ({})", rc.0)));
    }

    // Everything after a successful open runs inside this closure so the
    // context is closed on every exit path below.
    let result = (|| -> Result<(u32, u32, Vec<u8>), BackendError> {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(transcode_err("rav1d data_create failed"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(transcode_err(format!("rav1d send_data failed ({})", rc.0)));
        }

        let mut picture = PictureGuard(unsafe { std::mem::zeroed::<Dav1dPicture>() });
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut picture.0)) };
        if rc.0 != 0 {
            return Err(transcode_err(format!("rav1d get_picture failed ({})", rc.0)));
        }
        picture.to_rgb()
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    result
}

/// Owns a decoded picture and releases it when dropped.
struct PictureGuard(rav1d::include::dav1d::picture::Dav1dPicture);

impl Drop for PictureGuard {
    fn drop(&mut self) {
        if self.0.data[0].is_some() {
            unsafe { rav1d::src::lib::dav1d_picture_unref(std::ptr::NonNull::new(&mut self.0)) };
        }
    }
}

/// One plane of a decoded picture.
#[derive(Clone, Copy)]
struct Plane {
    ptr: *const u8,
    stride: isize,
    bpc: u32,
}

impl Plane {
    /// Sample at `(x, y)`; 8-bit planes store bytes, deeper ones store `u16`.
    ///
    /// # Safety
    /// `(x, y)` must lie inside the plane the decoder allocated.
    #[inline]
    unsafe fn sample(&self, x: u32, y: u32) -> f32 {
        let row = y as isize * self.stride;
        if self.bpc <= 8 {
            (unsafe { *self.ptr.offset(row + x as isize) }) as f32
        } else {
            let p = unsafe { self.ptr.offset(row + x as isize * 2) } as *const u16;
            (unsafe { p.read_unaligned() }) as f32
        }
    }
}

impl PictureGuard {
    /// BT.601 YCbCr → RGB8, honouring the chroma subsampling layout.
    fn to_rgb(&self) -> Result<(u32, u32, Vec<u8>), BackendError> {
        use rav1d::include::dav1d::headers::{
            DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
            DAV1D_PIXEL_LAYOUT_I444,
        };

        let pic = &self.0;
        let (width, height) = (pic.p.w as u32, pic.p.h as u32);
        let bpc = pic.p.bpc as u32;
        if width == 0 || height == 0 || bpc == 0 {
            return Err(transcode_err("decoded AVIF frame is empty"));
        }
        let luma_ptr = pic.data[0]
            .ok_or_else(|| transcode_err("decoded AVIF frame has no luma plane"))?
            .as_ptr() as *const u8;
        let luma = Plane {
            ptr: luma_ptr,
            stride: pic.stride[0],
            bpc,
        };

        let layout = pic.p.layout;
        let chroma = if layout == DAV1D_PIXEL_LAYOUT_I400 {
            None
        } else {
            let (ss_x, ss_y) = match layout {
                DAV1D_PIXEL_LAYOUT_I420 => (true, true),
                DAV1D_PIXEL_LAYOUT_I422 => (true, false),
                DAV1D_PIXEL_LAYOUT_I444 => (false, false),
                other => return Err(transcode_err(format!("unsupported pixel layout {other}"))),
            };
            let plane = |i: usize| -> Result<Plane, BackendError> {
                let ptr = pic.data[i]
                    .ok_or_else(|| transcode_err("decoded AVIF frame lacks chroma"))?
                    .as_ptr() as *const u8;
                Ok(Plane {
                    ptr,
                    stride: pic.stride[1],
                    bpc,
                })
            };
            Some((plane(1)?, plane(2)?, ss_x, ss_y))
        };

        let max_val = ((1u32 << bpc) - 1) as f32;
        let center = (1u32 << (bpc - 1)) as f32;
        let scale = 255.0 / max_val;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let luma_val = unsafe { luma.sample(x, y) };
                match chroma {
                    None => {
                        let v = to_u8(luma_val);
                        rgb.extend_from_slice(&[v, v, v]);
                    }
                    Some((cb_plane, cr_plane, ss_x, ss_y)) => {
                        let cx = if ss_x { x / 2 } else { x };
                        let cy = if ss_y { y / 2 } else { y };
                        let cb = unsafe { cb_plane.sample(cx, cy) } - center;
                        let cr = unsafe { cr_plane.sample(cx, cy) } - center;
                        rgb.extend_from_slice(&[
                            to_u8(luma_val + 1.402 * cr),
                            to_u8(luma_val - 0.344136 * cb - 0.714136 * cr),
                            to_u8(luma_val + 1.772 * cb),
                        ]);
                    }
                }
            }
        }
        Ok((width, height, rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    fn avif_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut cursor = Cursor::new(Vec::new());
        let encoder =
            image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut cursor, 10, 80);
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(encoder)
            .unwrap();
        cursor.into_inner()
    }

    struct FailingTranscoder;

    impl Transcoder for FailingTranscoder {
        fn name(&self) -> &'static str {
            "heic-stub"
        }
        fn handles(&self, ext: &str) -> bool {
            ext == "heic"
        }
        fn transcode(&self, _bytes: &[u8]) -> Result<Vec<u8>, BackendError> {
            Err(BackendError::TranscodeFailed("corrupt".into()))
        }
    }

    #[test]
    fn legacy_extensions_are_case_insensitive() {
        assert!(is_legacy_extension("HEIC"));
        assert!(is_legacy_extension("avif"));
        assert!(!is_legacy_extension("jpg"));
    }

    #[test]
    fn standard_set_has_no_heic_decoder() {
        let transcoders = Transcoders::standard();
        assert!(transcoders.find("avif").is_some());
        assert!(transcoders.find("heic").is_none());
        let err = transcoders.transcode("heic", b"ftypheic").unwrap_err();
        assert!(err.to_string().contains(".heic"));
    }

    #[test]
    fn registered_transcoder_is_found_by_extension() {
        let transcoders = Transcoders::empty().with(FailingTranscoder);
        assert_eq!(transcoders.find("HEIC").map(|t| t.name()), Some("heic-stub"));
        assert!(transcoders.transcode("heic", b"x").is_err());
    }

    #[test]
    fn avif_transcodes_to_jpeg_with_same_dimensions() {
        let jpeg = AvifTranscoder.transcode(&avif_bytes(64, 48)).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn avif_garbage_is_rejected() {
        assert!(AvifTranscoder.transcode(b"not an avif").is_err());
    }
}
