//! Boundary overlay rendering.
//!
//! Renders one RGB frame per captured iteration: the source image,
//! slightly darkened, with the inner rim of the segmented region painted
//! blue. The rim is softened into a band roughly one pixel wide so the
//! curve reads clearly once the frames are palette-quantized.
//!
//! All arithmetic happens in normalized units (`[0, 1]` per channel);
//! only the final step maps to 8-bit samples.

use std::collections::TryReserveError;

use crate::types::{Channels, PipelineError, PlanarImage, RgbImage, Sample, ensure_same_size};

/// Factor applied to every source channel before blending, so the
/// highlight stands out against bright regions.
pub const DARKEN: Sample = 0.95;

/// Offsets to the 4-connected neighbours of pixel `i` at `(x, y)`.
///
/// A neighbour that would fall outside the image is replaced by the
/// pixel itself.
#[derive(Debug, Clone, Copy)]
struct Neighbours {
    left: usize,
    right: usize,
    up: usize,
    down: usize,
}

impl Neighbours {
    const fn at(x: usize, y: usize, width: usize, height: usize) -> Self {
        let i = y * width + x;
        Self {
            left: if x == 0 { i } else { i - 1 },
            right: if x + 1 == width { i } else { i + 1 },
            up: if y == 0 { i } else { i - width },
            down: if y + 1 == height { i } else { i + width },
        }
    }

    const fn all(self) -> [usize; 4] {
        [self.left, self.right, self.up, self.down]
    }
}

fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, value);
    Ok(v)
}

/// Mark pixels on the inner rim of the segmented region.
///
/// A pixel is on the edge (`1`) when it is inside (`phi >= 0`) and at
/// least one 4-connected neighbour is outside (`phi < 0`). Everything
/// else is `0`. Neighbours beyond the border count as the pixel itself,
/// so the image border never creates an edge.
///
/// # Errors
///
/// Returns [`PipelineError::OutOfMemory`] if the indicator buffer cannot
/// be allocated.
pub fn edge_indicator(phi: &PlanarImage) -> Result<Vec<u8>, PipelineError> {
    let width = phi.width() as usize;
    let height = phi.height() as usize;
    let values = phi.plane(0);
    let mut edges = try_filled(width * height, 0u8)?;

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if values[i] < 0.0 {
                continue;
            }
            let n = Neighbours::at(x, y, width, height);
            if n.all().iter().any(|&j| values[j] < 0.0) {
                edges[i] = 1;
            }
        }
    }
    Ok(edges)
}

/// Blur a binary edge map into highlight opacity.
///
/// `alpha = (4 * e[i] + e[left] + e[right] + e[up] + e[down]) / 4`,
/// clamped to at most `1.0`, with the same border clamping as
/// [`edge_indicator`]. Edge pixels get full opacity, their neighbours a
/// quarter per adjacent edge pixel.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if `edges` does not hold
/// `width * height` values and [`PipelineError::OutOfMemory`] if the
/// alpha buffer cannot be allocated.
pub fn soft_alpha(edges: &[u8], width: usize, height: usize) -> Result<Vec<Sample>, PipelineError> {
    if edges.len() != width * height {
        return Err(PipelineError::InvalidImage(format!(
            "edge map has {} values, expected {width}x{height}",
            edges.len()
        )));
    }
    let mut alpha = try_filled(width * height, 0.0)?;

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let n = Neighbours::at(x, y, width, height);
            let sum = 4 * u32::from(edges[i])
                + n.all().iter().map(|&j| u32::from(edges[j])).sum::<u32>();
            alpha[i] = (f64::from(sum) / 4.0).min(1.0);
        }
    }
    Ok(alpha)
}

/// Map a normalized sample to 8 bits with saturation.
///
/// Negative values become `0`, values above `1.0` become `255`, and
/// everything else is rounded half-up: `floor(255 * x + 0.5)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_clamp(x: Sample) -> u8 {
    if x < 0.0 {
        0
    } else if x > 1.0 {
        255
    } else {
        255.0f64.mul_add(x, 0.5).floor() as u8
    }
}

/// Render the highlighted-boundary frame for one iteration.
///
/// Each source channel is darkened by [`DARKEN`], then blended towards
/// pure blue with the soft edge opacity:
///
/// ```text
/// R = (1 - a) * 0.95 * r
/// G = (1 - a) * 0.95 * g
/// B = (1 - a) * 0.95 * b + a
/// ```
///
/// Grayscale sources feed the same channel into R, G, and B.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `phi` and `source`
/// differ in size, and [`PipelineError::OutOfMemory`] if a working
/// buffer cannot be allocated.
pub fn compose_overlay(phi: &PlanarImage, source: &PlanarImage) -> Result<RgbImage, PipelineError> {
    ensure_same_size("phi", phi.dimensions(), "image", source.dimensions())?;

    let width = phi.width() as usize;
    let height = phi.height() as usize;
    let edges = edge_indicator(phi)?;
    let alpha = soft_alpha(&edges, width, height)?;

    let (red, green, blue) = match source.channels() {
        Channels::Gray => (source.plane(0), source.plane(0), source.plane(0)),
        Channels::Rgb => (source.plane(0), source.plane(1), source.plane(2)),
    };

    let mut raw = try_filled(width * height * 3, 0u8)?;
    for (i, px) in raw.chunks_exact_mut(3).enumerate() {
        let a = alpha[i];
        let keep = (1.0 - a) * DARKEN;
        px[0] = round_clamp(keep * red[i]);
        px[1] = round_clamp(keep * green[i]);
        px[2] = round_clamp(keep.mul_add(blue[i], a));
    }

    RgbImage::from_raw(phi.width(), phi.height(), raw).ok_or_else(|| {
        PipelineError::InvalidImage("overlay buffer does not match its dimensions".to_owned())
    })
}
