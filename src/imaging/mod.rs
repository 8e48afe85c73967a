//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with format sniffing |
//! | **Legacy formats** | `avif-parse` + `rav1d` → JPEG intermediate |
//! | **Resolve size** | lock-aware dimension resolver |
//! | **Resize → encode** | `resize_exact` (Catmull-Rom) + `image` encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Transcode**: [`Transcoder`] trait for formats the backend cannot decode
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod transcode;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{DimensionLocks, parse_dimension_field, resolve_dimensions, resolve_entered};
pub use operations::{SizeFields, convert_all, convert_image, plan_conversion};
pub use params::{EncodeParams, OutputFormat, OutputSpec, Quality, UnknownFormat};
pub use rust_backend::RustBackend;
pub use transcode::{Transcoder, Transcoders};
