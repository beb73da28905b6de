//! segreel-export: concrete export collaborators.
//!
//! Implements the [`Quantizer`](segreel_pipeline::Quantizer) and
//! [`AnimationEncoder`](segreel_pipeline::AnimationEncoder) seams of
//! `segreel-pipeline` with NeuQuant palette quantization and looping GIF
//! output.

pub mod encode;
pub mod quantize;

pub use encode::{GifEncoder, GifError, encode_gif};
pub use quantize::{NeuQuantizer, QuantizeError};
