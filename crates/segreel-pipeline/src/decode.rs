//! Image decoding into planar sample buffers.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! [`PlanarImage`] with samples normalized to `[0, 1]`. Images without
//! colour information stay single-channel; everything else becomes RGB.

use image::DynamicImage;

use crate::types::{Channels, Dimensions, PipelineError, PlanarImage, Sample};

/// Scale applied to a `[0, 1]` sample when it is read as an initial level
/// set: `phi = LEVEL_SET_SCALE * (2v - 1)`, so mid-gray is the boundary.
pub const LEVEL_SET_SCALE: Sample = 4.0;

/// Decode raw image bytes into a normalized planar image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_source(bytes: &[u8]) -> Result<PlanarImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    from_dynamic(&img)
}

/// Decode raw image bytes into a signed initial level set.
///
/// The image is converted to grayscale, normalized to `[0, 1]`, and
/// mapped through `4 * (2v - 1)`: white pixels start inside the curve,
/// black pixels outside.
///
/// # Errors
///
/// Same as [`decode_source`].
pub fn decode_level_set(bytes: &[u8]) -> Result<PlanarImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    let luma = img.to_luma32f();
    let dimensions = Dimensions::new(luma.width(), luma.height());
    let data = luma
        .as_raw()
        .iter()
        .map(|&v| LEVEL_SET_SCALE * 2.0f64.mul_add(f64::from(v), -1.0))
        .collect();
    PlanarImage::new(dimensions, Channels::Gray, data)
}

/// Convert a decoded image into a planar buffer.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] for zero-sized images.
pub fn from_dynamic(img: &DynamicImage) -> Result<PlanarImage, PipelineError> {
    let dimensions = Dimensions::new(img.width(), img.height());
    if img.color().has_color() {
        let rgb = img.to_rgb32f();
        let n = dimensions.pixel_count();
        let mut data = vec![0.0; n * 3];
        for (i, px) in rgb.as_raw().chunks_exact(3).enumerate() {
            data[i] = f64::from(px[0]);
            data[i + n] = f64::from(px[1]);
            data[i + 2 * n] = f64::from(px[2]);
        }
        PlanarImage::new(dimensions, Channels::Rgb, data)
    } else {
        let luma = img.to_luma32f();
        let data = luma.as_raw().iter().map(|&v| f64::from(v)).collect();
        PlanarImage::new(dimensions, Channels::Gray, data)
    }
}
