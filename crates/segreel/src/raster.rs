//! Raster file I/O: reading the source and initial level set, writing
//! the final mask.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use segreel_pipeline::{GrayImage, PlanarImage, decode};

use crate::run::RunError;

fn read_bytes(path: &Path) -> Result<Vec<u8>, RunError> {
    std::fs::read(path).map_err(|source| RunError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and decode the image to segment.
///
/// # Errors
///
/// Returns [`RunError::Read`] if the file cannot be read and
/// [`RunError::Decode`] if it is not a supported image.
pub fn read_source(path: &Path) -> Result<PlanarImage, RunError> {
    let bytes = read_bytes(path)?;
    decode::decode_source(&bytes).map_err(|source| RunError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an initial level set image (mid-gray is the zero level).
///
/// # Errors
///
/// Same as [`read_source`].
pub fn read_level_set(path: &Path) -> Result<PlanarImage, RunError> {
    let bytes = read_bytes(path)?;
    decode::decode_level_set(&bytes).map_err(|source| RunError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_to_vec(
    mask: &GrayImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    if format == ImageFormat::Jpeg {
        JpegEncoder::new_with_quality(&mut bytes, jpeg_quality).write_image(
            mask.as_raw(),
            mask.width(),
            mask.height(),
            ExtendedColorType::L8,
        )?;
    } else {
        mask.write_to(&mut Cursor::new(&mut bytes), format)?;
    }
    Ok(bytes)
}

/// Encode the binary mask in memory, choosing the format from the
/// extension of `path`.
///
/// JPEG output uses `jpeg_quality`.
///
/// # Errors
///
/// Returns [`RunError::WriteMask`] for unknown extensions and encoder
/// failures.
pub fn encode_mask(mask: &GrayImage, path: &Path, jpeg_quality: u8) -> Result<Vec<u8>, RunError> {
    ImageFormat::from_path(path)
        .and_then(|format| encode_to_vec(mask, format, jpeg_quality))
        .map_err(|source| RunError::WriteMask {
            path: path.to_path_buf(),
            source,
        })
}

/// Write an encoded mask to `path` in one call.
///
/// # Errors
///
/// Returns [`RunError::WriteMask`] if the file cannot be written.
pub fn write_mask(path: &Path, bytes: &[u8]) -> Result<(), RunError> {
    std::fs::write(path, bytes).map_err(|e| RunError::WriteMask {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(e),
    })
}
