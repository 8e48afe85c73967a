//! Pure calculation functions for output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! The resolver turns the raw text of the width/height inputs plus the
//! [`DimensionLocks`] toggles into a concrete pixel size for one image. In a
//! batch every image is resolved against the *same* inputs but its *own*
//! aspect ratio, so a locked width of 400 yields 400×300 for a 4:3 source and
//! 400×711 for a 9:16 one.
//!
//! Derived axes are rounded half away from zero (`f64::round`). Entered
//! values are never rounded; they are integers by construction.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};

/// Which dimensions the user has pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionLocks {
    pub width: bool,
    pub height: bool,
    pub ratio: bool,
}

impl DimensionLocks {
    pub fn new(width: bool, height: bool, ratio: bool) -> Self {
        Self {
            width,
            height,
            ratio,
        }
    }
}

/// Parse a width/height input field.
///
/// Mirrors a lenient integer parse: surrounding whitespace is ignored, an
/// optional sign and the leading run of digits are read, anything after that
/// (a fractional part, units) is dropped. Empty, non-numeric, zero and
/// negative input all count as "not entered".
///
/// ```
/// # use pixbatch::imaging::parse_dimension_field;
/// assert_eq!(parse_dimension_field("640"), Some(640));
/// assert_eq!(parse_dimension_field(" 640.7 "), Some(640));
/// assert_eq!(parse_dimension_field("0"), None);
/// assert_eq!(parse_dimension_field("-20"), None);
/// assert_eq!(parse_dimension_field("wide"), None);
/// ```
pub fn parse_dimension_field(raw: &str) -> Option<u32> {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 || negative {
        return None;
    }
    // Saturate absurdly long inputs instead of treating them as absent.
    let value = digits[..end].parse::<u64>().unwrap_or(u64::MAX);
    match u32::try_from(value).unwrap_or(u32::MAX) {
        0 => None,
        v => Some(v),
    }
}

fn height_from_width(width: u32, ratio: f64) -> u32 {
    clamp_axis((width as f64 / ratio).round())
}

fn width_from_height(height: u32, ratio: f64) -> u32 {
    clamp_axis((height as f64 * ratio).round())
}

fn clamp_axis(value: f64) -> u32 {
    if value.is_nan() || value < 1.0 {
        1
    } else if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// Resolve the output size for one image.
///
/// # Arguments
/// * `original` - Decoded dimensions of the source (both > 0)
/// * `locks` - Width/height/ratio lock toggles
/// * `width_field`, `height_field` - Raw input text, see [`parse_dimension_field`]
///
/// # Returns
/// * Output dimensions, each axis at least 1 pixel
pub fn resolve_dimensions(
    original: Dimensions,
    locks: DimensionLocks,
    width_field: &str,
    height_field: &str,
) -> Dimensions {
    let entered_w = parse_dimension_field(width_field);
    let entered_h = parse_dimension_field(height_field);
    resolve_entered(original, locks, entered_w, entered_h)
}

/// Same as [`resolve_dimensions`] with already-parsed inputs.
pub fn resolve_entered(
    original: Dimensions,
    locks: DimensionLocks,
    entered_w: Option<u32>,
    entered_h: Option<u32>,
) -> Dimensions {
    let orig_w = original.width.max(1);
    let orig_h = original.height.max(1);
    let ratio = orig_w as f64 / orig_h as f64;

    let (width, height) = match (locks.width, locks.height) {
        (true, true) => (entered_w.unwrap_or(orig_w), entered_h.unwrap_or(orig_h)),
        (true, false) => match entered_w {
            Some(w) if locks.ratio => (w, height_from_width(w, ratio)),
            Some(w) => (w, entered_h.unwrap_or(orig_h)),
            None if locks.ratio => (orig_w, orig_h),
            None => (orig_w, entered_h.unwrap_or(orig_h)),
        },
        (false, true) => match entered_h {
            Some(h) if locks.ratio => (width_from_height(h, ratio), h),
            Some(h) => (entered_w.unwrap_or(orig_w), h),
            None if locks.ratio => (orig_w, orig_h),
            None => (entered_w.unwrap_or(orig_w), orig_h),
        },
        (false, false) => match (entered_w, entered_h) {
            // Both entered: taken as-is, even with the ratio lock on.
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) if locks.ratio => (w, height_from_width(w, ratio)),
            (None, Some(h)) if locks.ratio => (width_from_height(h, ratio), h),
            (Some(w), None) => (w, orig_h),
            (None, Some(h)) => (orig_w, h),
            (None, None) => (orig_w, orig_h),
        },
    };

    Dimensions {
        width: width.max(1),
        height: height.max(1),
    }
}
