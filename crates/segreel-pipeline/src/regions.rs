//! Region statistics and the final binary segmentation.

use crate::types::{GrayImage, PipelineError, PlanarImage, ensure_same_size};

/// Per-channel mean colour of the two regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMeans {
    /// Mean inside the curve (`phi >= 0`), one entry per channel.
    pub inside: Vec<f64>,
    /// Mean outside the curve (`phi < 0`), one entry per channel.
    pub outside: Vec<f64>,
}

/// Compute the mean of `image` inside and outside the curve.
///
/// An empty region reports a mean of `0.0` for every channel.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `phi` and `image`
/// differ in size.
#[allow(clippy::cast_precision_loss)]
pub fn region_averages(phi: &PlanarImage, image: &PlanarImage) -> Result<RegionMeans, PipelineError> {
    ensure_same_size("phi", phi.dimensions(), "image", image.dimensions())?;

    let values = phi.plane(0);
    let channels = image.channels().count();
    let mut inside = vec![0.0; channels];
    let mut outside = vec![0.0; channels];

    let inside_count = values.iter().filter(|&&v| v >= 0.0).count();
    let outside_count = values.len() - inside_count;

    for c in 0..channels {
        let plane = image.plane(c);
        let (sum_in, sum_out) = values
            .iter()
            .zip(plane)
            .fold((0.0, 0.0), |(si, so), (&p, &f)| {
                if p >= 0.0 { (si + f, so) } else { (si, so + f) }
            });
        if inside_count > 0 {
            inside[c] = sum_in / inside_count as f64;
        }
        if outside_count > 0 {
            outside[c] = sum_out / outside_count as f64;
        }
    }

    Ok(RegionMeans { inside, outside })
}

/// Render the segmentation as a binary mask: 255 inside, 0 outside.
#[must_use]
pub fn binary_mask(phi: &PlanarImage) -> GrayImage {
    let values = phi.plane(0);
    let width = phi.width();
    GrayImage::from_fn(width, phi.height(), |x, y| {
        let i = y as usize * width as usize + x as usize;
        image::Luma([if values[i] >= 0.0 { 255 } else { 0 }])
    })
}
