//! GIF container encoding.
//!
//! The first frame is stored whole. Every later frame is cropped to the
//! bounding box of its changed pixels and declares the skip index
//! transparent, with `Keep` disposal so the decoder composites it over
//! the previous frame. The animation loops forever.

use std::borrow::Cow;
use std::path::Path;

use segreel_pipeline::{AnimationEncoder, BoxError, Dimensions, IndexedAnimation};

/// Errors raised while encoding a GIF.
#[derive(Debug, thiserror::Error)]
pub enum GifError {
    /// GIF stores sizes as 16-bit values.
    #[error("{width}x{height} exceeds the GIF limit of 65535x65535")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The animation does not describe a consistent set of frames.
    #[error("malformed animation: {0}")]
    Malformed(String),

    /// The gif crate rejected a frame or header.
    #[error(transparent)]
    Encoding(#[from] gif::EncodingError),

    /// Writing the encoded bytes failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pixel rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

/// Bounding box of pixels that are not `skip`, if any.
fn changed_bounds(frame: &[u8], width: usize, skip: u8) -> Option<Rect> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for (i, _) in frame.iter().enumerate().filter(|&(_, &v)| v != skip) {
        let (x, y) = (i % width, i / width);
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| Rect {
        left: x0,
        top: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    })
}

fn crop(frame: &[u8], width: usize, rect: Rect) -> Vec<u8> {
    let mut out = Vec::with_capacity(rect.width * rect.height);
    for row in rect.top..rect.top + rect.height {
        let start = row * width + rect.left;
        out.extend_from_slice(&frame[start..start + rect.width]);
    }
    out
}

fn to_u16(value: usize, dimensions: Dimensions) -> Result<u16, GifError> {
    u16::try_from(value).map_err(|_| GifError::TooLarge {
        width: dimensions.width,
        height: dimensions.height,
    })
}

fn check(animation: &IndexedAnimation) -> Result<(), GifError> {
    if animation.palette.len() != 256 {
        return Err(GifError::Malformed(format!(
            "palette has {} entries, expected 256",
            animation.palette.len()
        )));
    }
    if animation.frames.is_empty() {
        return Err(GifError::Malformed("no frames".to_owned()));
    }
    if animation.frames.len() != animation.delays.len() {
        return Err(GifError::Malformed(format!(
            "{} frames but {} delays",
            animation.frames.len(),
            animation.delays.len()
        )));
    }
    let pixels = animation.dimensions.pixel_count();
    if let Some(k) = animation.frames.iter().position(|f| f.len() != pixels) {
        return Err(GifError::Malformed(format!(
            "frame {k} has {} pixels, expected {pixels}",
            animation.frames[k].len()
        )));
    }
    Ok(())
}

/// Encode `animation` to GIF bytes in memory.
///
/// # Errors
///
/// Returns [`GifError::TooLarge`] for frames wider or taller than 65535
/// pixels, [`GifError::Malformed`] for inconsistent input, and
/// [`GifError::Encoding`] if the gif crate rejects a frame.
pub fn encode_gif(animation: &IndexedAnimation) -> Result<Vec<u8>, GifError> {
    check(animation)?;
    let dims = animation.dimensions;
    let width = dims.width as usize;
    let canvas_w = to_u16(width, dims)?;
    let canvas_h = to_u16(dims.height as usize, dims)?;
    let skip = animation.skip_index;

    let palette: Vec<u8> = animation.palette.iter().flatten().copied().collect();
    let mut encoder = gif::Encoder::new(Vec::new(), canvas_w, canvas_h, &palette)?;
    encoder.set_repeat(gif::Repeat::Infinite)?;

    for (k, (indices, &delay)) in animation.frames.iter().zip(&animation.delays).enumerate() {
        let mut frame = gif::Frame {
            delay,
            dispose: gif::DisposalMethod::Keep,
            ..gif::Frame::default()
        };
        if k == 0 {
            frame.width = canvas_w;
            frame.height = canvas_h;
            frame.buffer = Cow::Borrowed(indices);
        } else {
            // A frame identical to its predecessor still carries its delay.
            let rect = changed_bounds(indices, width, skip).unwrap_or(Rect {
                left: 0,
                top: 0,
                width: 1,
                height: 1,
            });
            frame.left = to_u16(rect.left, dims)?;
            frame.top = to_u16(rect.top, dims)?;
            frame.width = to_u16(rect.width, dims)?;
            frame.height = to_u16(rect.height, dims)?;
            frame.transparent = Some(skip);
            frame.buffer = Cow::Owned(crop(indices, width, rect));
        }
        encoder.write_frame(&frame)?;
    }

    Ok(encoder.into_inner()?)
}

/// [`AnimationEncoder`] that writes looping GIF files.
///
/// The file is encoded in memory and written with a single call, so a
/// failed encode never leaves a partial file behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifEncoder;

impl AnimationEncoder for GifEncoder {
    fn encode(&self, animation: &IndexedAnimation, path: &Path) -> Result<(), BoxError> {
        let bytes = encode_gif(animation)?;
        std::fs::write(path, &bytes).map_err(GifError::from)?;
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            frames = animation.frames.len(),
            "wrote gif"
        );
        Ok(())
    }
}
