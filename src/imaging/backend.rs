//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: decode raw bytes into pixels, and re-encode pixels at a target
//! size and format.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, every codec
//! statically linked into the binary.

use super::params::EncodeParams;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Decode raw file bytes into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Stretch `image` to exactly `params.width × params.height` and encode it.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
