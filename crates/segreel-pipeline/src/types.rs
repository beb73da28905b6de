//! Shared types for the segreel capture pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can handle composited
/// frames without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` for the binary segmentation mask.
pub use image::GrayImage;

/// Sample type of every planar buffer (source image and level set).
pub type Sample = f64;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Number of colour channels in a [`PlanarImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    /// Single channel (grayscale image or level set).
    Gray,
    /// Three channels, stored as red plane, green plane, blue plane.
    Rgb,
}

impl Channels {
    /// Channel count as a number.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// Owned grid of floating-point samples in planar layout.
///
/// All of channel 0 is stored first, then all of channel 1, and so on.
/// Pixel `(x, y)` of channel `c` lives at
/// `c * width * height + y * width + x`.
///
/// The same type carries the source image (samples normalized to
/// `[0, 1]`) and the level-set field (single channel, signed).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    dimensions: Dimensions,
    channels: Channels,
    data: Vec<Sample>,
}

impl PlanarImage {
    /// Wrap an existing sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidImage`] if either dimension is zero
    /// or `data.len()` differs from `width * height * channels`.
    pub fn new(
        dimensions: Dimensions,
        channels: Channels,
        data: Vec<Sample>,
    ) -> Result<Self, PipelineError> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(PipelineError::InvalidImage(format!(
                "dimensions must be non-zero, got {}x{}",
                dimensions.width, dimensions.height,
            )));
        }
        let expected = dimensions.pixel_count() * channels.count();
        if data.len() != expected {
            return Err(PipelineError::InvalidImage(format!(
                "expected {expected} samples for {}x{}x{}, got {}",
                dimensions.width,
                dimensions.height,
                channels.count(),
                data.len(),
            )));
        }
        Ok(Self {
            dimensions,
            channels,
            data,
        })
    }

    /// Build an image by evaluating `f(channel, x, y)` for every sample.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidImage`] if either dimension is zero.
    pub fn from_fn(
        dimensions: Dimensions,
        channels: Channels,
        mut f: impl FnMut(usize, u32, u32) -> Sample,
    ) -> Result<Self, PipelineError> {
        let mut data = Vec::with_capacity(dimensions.pixel_count() * channels.count());
        for c in 0..channels.count() {
            for y in 0..dimensions.height {
                for x in 0..dimensions.width {
                    data.push(f(c, x, y));
                }
            }
        }
        Self::new(dimensions, channels, data)
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Channel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// All samples, planar.
    #[must_use]
    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    /// All samples, planar, mutable. The length cannot change.
    pub fn data_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// The samples of one channel.
    ///
    /// Channel indices beyond the last channel yield an empty slice.
    #[must_use]
    pub fn plane(&self, channel: usize) -> &[Sample] {
        let n = self.dimensions.pixel_count();
        self.data.get(channel * n..(channel + 1) * n).unwrap_or(&[])
    }
}

/// Errors raised by the sans-IO pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A planar buffer does not satisfy its shape invariant.
    #[error("invalid image buffer: {0}")]
    InvalidImage(String),

    /// Two images that must share a size do not.
    #[error(
        "size mismatch: {left_name} ({}x{}) does not match {right_name} ({}x{})",
        .left.width, .left.height, .right.width, .right.height
    )]
    DimensionMismatch {
        /// Name of the first image, for diagnostics.
        left_name: &'static str,
        /// Dimensions of the first image.
        left: Dimensions,
        /// Name of the second image, for diagnostics.
        right_name: &'static str,
        /// Dimensions of the second image.
        right: Dimensions,
    },

    /// A buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory(#[from] std::collections::TryReserveError),
}

/// Check that two images share their width and height.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] naming both images.
pub fn ensure_same_size(
    left_name: &'static str,
    left: Dimensions,
    right_name: &'static str,
    right: Dimensions,
) -> Result<(), PipelineError> {
    if left == right {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            left_name,
            left,
            right_name,
            right,
        })
    }
}
