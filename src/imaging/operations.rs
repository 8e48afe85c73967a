//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take the user's settings, compute parameters, and call the backend.

use super::backend::{Dimensions, ImageBackend};
use super::calculations::{DimensionLocks, resolve_dimensions};
use super::params::{EncodeParams, OutputSpec};
use image::DynamicImage;
use rayon::prelude::*;

/// Raw text of the width and height inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeFields {
    pub width: String,
    pub height: String,
}

impl SizeFields {
    pub fn new(width: impl Into<String>, height: impl Into<String>) -> Self {
        Self {
            width: width.into(),
            height: height.into(),
        }
    }
}

/// Plan a conversion without executing it.
pub fn plan_conversion(
    original: Dimensions,
    locks: DimensionLocks,
    fields: &SizeFields,
    output: &OutputSpec,
) -> EncodeParams {
    let target = resolve_dimensions(original, locks, &fields.width, &fields.height);
    EncodeParams {
        width: target.width,
        height: target.height,
        format: output.format,
        quality: output.quality,
    }
}

/// Convert one image, turning an encoder failure into `None`.
///
/// Callers skip `None` items rather than aborting a batch.
pub fn convert_image(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    params: &EncodeParams,
) -> Option<Vec<u8>> {
    match backend.encode(image, params) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!(
                "could not encode {}x{} {}: {}",
                params.width,
                params.height,
                params.format,
                e
            );
            None
        }
    }
}

/// Convert every `(image, params)` job in parallel and wait for all of them.
///
/// The returned vector is in job order; failed jobs are `None`.
pub fn convert_all(
    backend: &impl ImageBackend,
    jobs: &[(&DynamicImage, EncodeParams)],
) -> Vec<Option<Vec<u8>>> {
    jobs.par_iter()
        .map(|(image, params)| convert_image(backend, image, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::params::{OutputFormat, Quality};
    use crate::imaging::rust_backend::RustBackend;

    fn output_spec(format: OutputFormat) -> OutputSpec {
        OutputSpec {
            format,
            quality: Quality::new(0.7),
            archive: false,
        }
    }

    #[test]
    fn plan_uses_original_size_without_input() {
        let params = plan_conversion(
            Dimensions {
                width: 800,
                height: 600,
            },
            DimensionLocks::default(),
            &SizeFields::default(),
            &output_spec(OutputFormat::Png),
        );
        assert_eq!((params.width, params.height), (800, 600));
        assert_eq!(params.format, OutputFormat::Png);
        assert_eq!(params.quality, Quality::new(0.7));
    }

    #[test]
    fn plan_applies_locks() {
        let params = plan_conversion(
            Dimensions {
                width: 800,
                height: 600,
            },
            DimensionLocks::new(true, false, true),
            &SizeFields::new("200", ""),
            &output_spec(OutputFormat::Jpeg),
        );
        assert_eq!((params.width, params.height), (200, 150));
    }

    #[test]
    fn convert_image_soft_fails() {
        let backend = MockBackend::failing_format(OutputFormat::Avif);
        let img = DynamicImage::new_rgb8(10, 10);
        let params = EncodeParams {
            width: 5,
            height: 5,
            format: OutputFormat::Avif,
            quality: Quality::default(),
        };
        assert_eq!(convert_image(&backend, &img, &params), None);
    }

    #[test]
    fn huge_entered_size_is_skipped_not_fatal() {
        let backend = RustBackend::new();
        let img = DynamicImage::new_rgb8(800, 600);
        let params = plan_conversion(
            Dimensions {
                width: 800,
                height: 600,
            },
            DimensionLocks::new(true, false, true),
            &SizeFields::new("99999999999", ""),
            &output_spec(OutputFormat::Png),
        );
        assert_eq!(params.width, u32::MAX);
        assert_eq!(convert_image(&backend, &img, &params), None);

        let small = DynamicImage::new_rgb8(8, 6);
        let ok = EncodeParams {
            width: 4,
            height: 3,
            ..params
        };
        let results = convert_all(&backend, &[(&img, params), (&small, ok)]);
        assert_eq!(results[0], None);
        assert!(results[1].is_some());
    }

    #[test]
    fn convert_all_keeps_job_order_and_skips_failures() {
        let backend = MockBackend::failing_width(20);
        let a = DynamicImage::new_rgb8(10, 10);
        let b = DynamicImage::new_rgb8(20, 10);
        let c = DynamicImage::new_rgb8(30, 10);
        let params = |w| EncodeParams {
            width: w,
            height: 1,
            format: OutputFormat::Png,
            quality: Quality::default(),
        };
        let jobs = vec![(&a, params(1)), (&b, params(2)), (&c, params(3))];

        let results = convert_all(&backend, &jobs);
        assert_eq!(
            results,
            vec![Some(b"png:1x1".to_vec()), None, Some(b"png:3x1".to_vec())]
        );
        let encodes = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Encode { .. }))
            .count();
        assert_eq!(encodes, 3);
    }
}
