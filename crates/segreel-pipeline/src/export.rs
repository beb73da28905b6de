//! Animation export: quantize -> diff -> encode.
//!
//! The orchestrator owns the sequencing and validation; the heavy
//! lifting is delegated through two traits:
//!
//! - [`Quantizer`]: pooled palette quantization of every frame,
//! - [`AnimationEncoder`]: writes the indexed frames to a container file.
//!
//! Between the two, [`frame_difference`] replaces pixels that did not
//! change since the previous frame with [`SKIP_INDEX`], which the
//! encoder declares transparent so those pixels are not re-stored.

use std::path::{Path, PathBuf};

use crate::frames::FrameSet;
use crate::types::{Dimensions, RgbImage};

/// Boxed error returned by export collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Palette index reserved for "unchanged since the previous frame".
pub const SKIP_INDEX: u8 = 255;

/// Colours the quantizer may use; the last slot belongs to [`SKIP_INDEX`].
pub const MAX_PALETTE_COLORS: usize = 255;

/// Size of the padded palette handed to the encoder.
pub const PALETTE_SIZE: usize = 256;

/// Output of a [`Quantizer`]: one shared palette and one index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedFrames {
    /// Shared palette, at most `max_colors` entries.
    pub palette: Vec<[u8; 3]>,
    /// One row-major index buffer per input frame.
    pub frames: Vec<Vec<u8>>,
}

/// Palette quantization over a pooled set of frames.
pub trait Quantizer {
    /// Compute one palette for all pixels of all `frames` and map every
    /// pixel to it.
    ///
    /// # Errors
    ///
    /// Any collaborator failure (e.g. allocation) aborts the export.
    fn quantize(&self, frames: &[RgbImage], max_colors: usize) -> Result<QuantizedFrames, BoxError>;
}

/// Indexed frames ready for container encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedAnimation {
    /// Size shared by every frame.
    pub dimensions: Dimensions,
    /// Palette padded to [`PALETTE_SIZE`] entries.
    pub palette: Vec<[u8; 3]>,
    /// Row-major index buffers. Every frame after the first may contain
    /// `skip_index` for unchanged pixels.
    pub frames: Vec<Vec<u8>>,
    /// Display delay per frame, in hundredths of a second.
    pub delays: Vec<u16>,
    /// Index marking pixels unchanged from the previous frame.
    pub skip_index: u8,
}

/// Writes an [`IndexedAnimation`] to a file.
pub trait AnimationEncoder {
    /// Encode `animation` to `path`.
    ///
    /// # Errors
    ///
    /// Any encoding or I/O failure.
    fn encode(&self, animation: &IndexedAnimation, path: &Path) -> Result<(), BoxError>;
}

/// Errors that abort an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The frame set was empty.
    #[error("no frames to export")]
    NoFrames,

    /// The quantizer reported a failure.
    #[error("color quantization failed: {0}")]
    Quantize(#[source] BoxError),

    /// The quantizer returned data that does not fit the frames.
    #[error("quantizer returned an invalid result: {0}")]
    InvalidQuantization(String),

    /// The encoder failed to write the output file.
    #[error("error writing \"{}\": {source}", .path.display())]
    Encode {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying encoder error.
        #[source]
        source: BoxError,
    },
}

/// Replace pixels equal to the same pixel of the previous frame with
/// `skip_index`.
///
/// Comparison is always against the previous frame as it was before
/// differencing, so frames are processed from last to first. The first
/// frame is never modified.
pub fn frame_difference(frames: &mut [Vec<u8>], skip_index: u8) {
    for k in (1..frames.len()).rev() {
        let (before, after) = frames.split_at_mut(k);
        let previous = &before[k - 1];
        for (current, &prev) in after[0].iter_mut().zip(previous) {
            if *current == prev {
                *current = skip_index;
            }
        }
    }
}

/// Undo [`frame_difference`]: fill every `skip_index` pixel from the
/// previous resolved frame.
///
/// This is what a decoder does when it composites transparent pixels over
/// the retained previous frame.
#[must_use]
pub fn resolve_frame_difference(frames: &[Vec<u8>], skip_index: u8) -> Vec<Vec<u8>> {
    let mut resolved: Vec<Vec<u8>> = Vec::with_capacity(frames.len());
    for frame in frames {
        let next = match resolved.last() {
            Some(previous) => frame
                .iter()
                .zip(previous)
                .map(|(&c, &p)| if c == skip_index { p } else { c })
                .collect(),
            None => frame.clone(),
        };
        resolved.push(next);
    }
    resolved
}

fn validate(
    quantized: &QuantizedFrames,
    frame_count: usize,
    pixel_count: usize,
) -> Result<(), ExportError> {
    let colors = quantized.palette.len();
    if colors == 0 || colors > MAX_PALETTE_COLORS {
        return Err(ExportError::InvalidQuantization(format!(
            "palette has {colors} colors, expected 1..={MAX_PALETTE_COLORS}"
        )));
    }
    if quantized.frames.len() != frame_count {
        return Err(ExportError::InvalidQuantization(format!(
            "got {} indexed frames for {frame_count} input frames",
            quantized.frames.len()
        )));
    }
    for (k, frame) in quantized.frames.iter().enumerate() {
        if frame.len() != pixel_count {
            return Err(ExportError::InvalidQuantization(format!(
                "frame {k} has {} indices, expected {pixel_count}",
                frame.len()
            )));
        }
        if let Some(&bad) = frame.iter().find(|&&i| usize::from(i) >= colors) {
            return Err(ExportError::InvalidQuantization(format!(
                "frame {k} uses index {bad} outside a palette of {colors} colors"
            )));
        }
    }
    Ok(())
}

/// Quantize and difference a frame set without encoding it.
///
/// # Errors
///
/// Returns [`ExportError::NoFrames`] for an empty set,
/// [`ExportError::Quantize`] if the quantizer fails, and
/// [`ExportError::InvalidQuantization`] if its output does not match the
/// frames.
pub fn prepare_animation(
    frames: &FrameSet,
    quantizer: &dyn Quantizer,
) -> Result<IndexedAnimation, ExportError> {
    let Some(dimensions) = frames.dimensions() else {
        return Err(ExportError::NoFrames);
    };

    // 1. Global quantization over every pixel of every frame.
    let quantized = quantizer
        .quantize(frames.frames(), MAX_PALETTE_COLORS)
        .map_err(ExportError::Quantize)?;
    validate(&quantized, frames.len(), dimensions.pixel_count())?;
    tracing::debug!(
        colors = quantized.palette.len(),
        frames = quantized.frames.len(),
        "quantized animation"
    );

    let QuantizedFrames {
        mut palette,
        frames: mut indexed,
    } = quantized;
    palette.resize(PALETTE_SIZE, [0, 0, 0]);

    // 2. Inter-frame optimization.
    frame_difference(&mut indexed, SKIP_INDEX);

    Ok(IndexedAnimation {
        dimensions,
        palette,
        frames: indexed,
        delays: frames.delays().to_vec(),
        skip_index: SKIP_INDEX,
    })
}

/// Export a frame set as one animated image file.
///
/// # Errors
///
/// Everything [`prepare_animation`] returns, plus
/// [`ExportError::Encode`] naming `path` if the encoder fails.
pub fn export_animation(
    frames: &FrameSet,
    quantizer: &dyn Quantizer,
    encoder: &dyn AnimationEncoder,
    path: &Path,
) -> Result<(), ExportError> {
    let animation = prepare_animation(frames, quantizer)?;

    // 3. Container encoding.
    encoder
        .encode(&animation, path)
        .map_err(|source| ExportError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!("Output written to \"{}\".", path.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;

    /// Lossless quantizer: assigns indices in first-seen order.
    struct ExactQuantizer;

    impl Quantizer for ExactQuantizer {
        fn quantize(
            &self,
            frames: &[RgbImage],
            max_colors: usize,
        ) -> Result<QuantizedFrames, BoxError> {
            let mut lookup: BTreeMap<[u8; 3], u8> = BTreeMap::new();
            let mut palette = Vec::new();
            let mut indexed = Vec::new();
            for frame in frames {
                let mut indices = Vec::new();
                for px in frame.pixels() {
                    let index = match lookup.get(&px.0) {
                        Some(&i) => i,
                        None => {
                            if palette.len() == max_colors {
                                return Err("too many colors".into());
                            }
                            let i = u8::try_from(palette.len())?;
                            palette.push(px.0);
                            lookup.insert(px.0, i);
                            i
                        }
                    };
                    indices.push(index);
                }
                indexed.push(indices);
            }
            Ok(QuantizedFrames {
                palette,
                frames: indexed,
            })
        }
    }

    struct FailingQuantizer;

    impl Quantizer for FailingQuantizer {
        fn quantize(&self, _: &[RgbImage], _: usize) -> Result<QuantizedFrames, BoxError> {
            Err("allocation failed".into())
        }
    }

    /// Quantizer that claims a single colour but emits index 3.
    struct BrokenQuantizer;

    impl Quantizer for BrokenQuantizer {
        fn quantize(&self, frames: &[RgbImage], _: usize) -> Result<QuantizedFrames, BoxError> {
            Ok(QuantizedFrames {
                palette: vec![[0, 0, 0]],
                frames: frames
                    .iter()
                    .map(|f| vec![3; f.pixels().len()])
                    .collect(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingEncoder {
        calls: RefCell<Vec<(IndexedAnimation, PathBuf)>>,
    }

    impl AnimationEncoder for RecordingEncoder {
        fn encode(&self, animation: &IndexedAnimation, path: &Path) -> Result<(), BoxError> {
            self.calls
                .borrow_mut()
                .push((animation.clone(), path.to_path_buf()));
            Ok(())
        }
    }

    struct FailingEncoder;

    impl AnimationEncoder for FailingEncoder {
        fn encode(&self, _: &IndexedAnimation, _: &Path) -> Result<(), BoxError> {
            Err("disk full".into())
        }
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb(rgb))
    }

    fn sample_frames() -> FrameSet {
        let mut set = FrameSet::new();
        set.push(solid(2, 2, [10, 10, 10]), 12).unwrap();
        let mut second = solid(2, 2, [10, 10, 10]);
        second.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        set.push(second, 12).unwrap();
        let mut third = solid(2, 2, [10, 10, 10]);
        third.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        third.put_pixel(0, 1, image::Rgb([0, 0, 255]));
        set.push(third, 120).unwrap();
        set
    }

    #[test]
    fn frame_difference_marks_unchanged_pixels() {
        let mut frames = vec![vec![1, 2, 3, 4], vec![1, 5, 3, 4], vec![1, 5, 6, 4]];
        frame_difference(&mut frames, SKIP_INDEX);
        assert_eq!(frames[0], vec![1, 2, 3, 4]);
        assert_eq!(frames[1], vec![255, 5, 255, 255]);
        assert_eq!(frames[2], vec![255, 255, 6, 255]);
    }

    #[test]
    fn frame_difference_single_frame_is_untouched() {
        let mut frames = vec![vec![7, 7, 7]];
        frame_difference(&mut frames, SKIP_INDEX);
        assert_eq!(frames, vec![vec![7, 7, 7]]);
    }

    #[test]
    fn resolve_undoes_difference() {
        let original = vec![vec![1, 2, 3, 4], vec![1, 5, 3, 4], vec![0, 5, 6, 4]];
        let mut diffed = original.clone();
        frame_difference(&mut diffed, SKIP_INDEX);
        assert_eq!(resolve_frame_difference(&diffed, SKIP_INDEX), original);
    }

    #[test]
    fn empty_frame_set_is_rejected() {
        let encoder = RecordingEncoder::default();
        let result = export_animation(
            &FrameSet::new(),
            &ExactQuantizer,
            &encoder,
            Path::new("out.gif"),
        );
        assert!(matches!(result, Err(ExportError::NoFrames)));
        assert!(encoder.calls.borrow().is_empty());
    }

    #[test]
    fn quantizer_failure_aborts_before_encoding() {
        let encoder = RecordingEncoder::default();
        let result = export_animation(
            &sample_frames(),
            &FailingQuantizer,
            &encoder,
            Path::new("out.gif"),
        );
        assert!(matches!(result, Err(ExportError::Quantize(_))));
        assert!(encoder.calls.borrow().is_empty());
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let result = prepare_animation(&sample_frames(), &BrokenQuantizer);
        assert!(matches!(result, Err(ExportError::InvalidQuantization(_))));
    }

    #[test]
    fn encoder_failure_names_the_path() {
        let err = export_animation(
            &sample_frames(),
            &ExactQuantizer,
            &FailingEncoder,
            Path::new("anim/out.gif"),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Encode { .. }));
        assert_eq!(err.to_string(), "error writing \"anim/out.gif\": disk full");
    }

    #[test]
    fn encoder_receives_padded_palette_and_diffed_frames() {
        let encoder = RecordingEncoder::default();
        export_animation(
            &sample_frames(),
            &ExactQuantizer,
            &encoder,
            Path::new("out.gif"),
        )
        .unwrap();

        let calls = encoder.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (animation, path) = &calls[0];
        assert_eq!(path, Path::new("out.gif"));
        assert_eq!(animation.dimensions, Dimensions::new(2, 2));
        assert_eq!(animation.palette.len(), PALETTE_SIZE);
        assert_eq!(animation.palette[0], [10, 10, 10]);
        assert_eq!(animation.palette[1], [0, 0, 255]);
        assert_eq!(animation.skip_index, SKIP_INDEX);
        assert_eq!(animation.delays, vec![12, 12, 120]);
        assert_eq!(animation.frames[0], vec![0, 0, 0, 0]);
        assert_eq!(animation.frames[1], vec![255, 1, 255, 255]);
        assert_eq!(animation.frames[2], vec![255, 255, 1, 255]);
    }

    #[test]
    fn prepare_is_deterministic() {
        let frames = sample_frames();
        let a = prepare_animation(&frames, &ExactQuantizer).unwrap();
        let b = prepare_animation(&frames, &ExactQuantizer).unwrap();
        assert_eq!(a, b);
    }
}
