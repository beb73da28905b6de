//! Pooled palette quantization.
//!
//! The whole animation shares a single palette, so colours stay stable
//! from frame to frame. When the frames hold no more distinct colours
//! than the palette allows, the palette is exact, in first-seen order.
//! Otherwise every pixel of every frame trains one NeuQuant network.
//! Both paths are deterministic: the same frames always produce the same
//! palette and indices.

use std::collections::HashMap;
use std::collections::TryReserveError;

use color_quant::NeuQuant;
use segreel_pipeline::{BoxError, QuantizedFrames, Quantizer, RgbImage};

/// Errors raised by [`NeuQuantizer`].
#[derive(Debug, thiserror::Error)]
pub enum QuantizeError {
    /// The pooled pixel buffer could not be allocated.
    #[error("out of memory while pooling {pixels} pixels")]
    OutOfMemory {
        /// Number of pixels that were being pooled.
        pixels: usize,
        /// Allocation failure.
        #[source]
        source: TryReserveError,
    },

    /// The requested palette size is not representable with 8-bit indices.
    #[error("palette size must be in 1..=256, got {0}")]
    ColorCount(usize),

    /// There is nothing to quantize.
    #[error("no pixels to quantize")]
    Empty,
}

/// Exact-palette quantizer with a NeuQuant fallback for frames holding
/// more colours than the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuQuantizer {
    sample_factor: i32,
}

impl NeuQuantizer {
    /// Default sampling factor: every 10th pixel trains the network.
    pub const DEFAULT_SAMPLE_FACTOR: i32 = 10;

    /// Create a quantizer with the given sampling factor.
    ///
    /// `1` trains on every pixel (best quality, slowest); `30` is the
    /// fastest setting. Values outside `1..=30` are clamped.
    #[must_use]
    pub fn new(sample_factor: i32) -> Self {
        Self {
            sample_factor: sample_factor.clamp(1, 30),
        }
    }

    /// The sampling factor in use.
    #[must_use]
    pub const fn sample_factor(&self) -> i32 {
        self.sample_factor
    }
}

impl Default for NeuQuantizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SAMPLE_FACTOR)
    }
}

/// Pool the RGB pixels of all frames into one opaque RGBA buffer.
fn pool_rgba(frames: &[RgbImage]) -> Result<Vec<u8>, QuantizeError> {
    let pixels: usize = frames.iter().map(|f| f.as_raw().len() / 3).sum();
    let mut pooled = Vec::new();
    pooled
        .try_reserve_exact(pixels * 4)
        .map_err(|source| QuantizeError::OutOfMemory { pixels, source })?;
    for frame in frames {
        for px in frame.as_raw().chunks_exact(3) {
            pooled.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
    }
    Ok(pooled)
}

/// Index every distinct colour in first-seen order.
///
/// Returns `None` as soon as more than `max_colors` colours appear.
fn exact_palette(frames: &[RgbImage], max_colors: usize) -> Option<QuantizedFrames> {
    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let mut palette: Vec<[u8; 3]> = Vec::new();
    let mut indexed = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut indices = Vec::with_capacity(frame.as_raw().len() / 3);
        for px in frame.as_raw().chunks_exact(3) {
            let rgb = [px[0], px[1], px[2]];
            let index = if let Some(&i) = lookup.get(&rgb) {
                i
            } else {
                if palette.len() == max_colors {
                    return None;
                }
                let i = u8::try_from(palette.len()).ok()?;
                palette.push(rgb);
                lookup.insert(rgb, i);
                i
            };
            indices.push(index);
        }
        indexed.push(indices);
    }
    Some(QuantizedFrames {
        palette,
        frames: indexed,
    })
}

impl Quantizer for NeuQuantizer {
    fn quantize(&self, frames: &[RgbImage], max_colors: usize) -> Result<QuantizedFrames, BoxError> {
        if max_colors == 0 || max_colors > 256 {
            return Err(QuantizeError::ColorCount(max_colors).into());
        }
        if frames.iter().all(|f| f.as_raw().is_empty()) {
            return Err(QuantizeError::Empty.into());
        }

        if let Some(exact) = exact_palette(frames, max_colors) {
            tracing::debug!(colors = exact.palette.len(), "exact palette");
            return Ok(exact);
        }

        let pooled = pool_rgba(frames)?;

        let network = NeuQuant::new(self.sample_factor, max_colors, &pooled);
        let palette: Vec<[u8; 3]> = network
            .color_map_rgb()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        // Overlay frames reuse few distinct colours, so memoize lookups.
        let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
        let mut indexed = Vec::with_capacity(frames.len());
        for frame in frames {
            let mut indices = Vec::with_capacity(frame.as_raw().len() / 3);
            for px in frame.as_raw().chunks_exact(3) {
                let rgb = [px[0], px[1], px[2]];
                let index = if let Some(&i) = cache.get(&rgb) {
                    i
                } else {
                    let i = u8::try_from(network.index_of(&[px[0], px[1], px[2], 255]))?;
                    cache.insert(rgb, i);
                    i
                };
                indices.push(index);
            }
            indexed.push(indices);
        }

        tracing::debug!(
            colors = palette.len(),
            distinct_inputs = cache.len(),
            sample_factor = self.sample_factor,
            "neuquant palette trained"
        );
        Ok(QuantizedFrames {
            palette,
            frames: indexed,
        })
    }
}
