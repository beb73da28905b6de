//! Integration test: overlay frames -> quantizer -> GIF file -> gif decoder.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use segreel_export::{GifEncoder, NeuQuantizer};
use segreel_pipeline::{
    Channels, Dimensions, FrameSet, PlanarImage, Quantizer, SKIP_INDEX, export,
    overlay::compose_overlay,
};

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("segreel-export-{}-{name}", std::process::id()))
}

/// Three overlay frames of a growing disc over a horizontal gradient.
fn growing_disc() -> FrameSet {
    let dims = Dimensions::new(24, 16);
    let source = PlanarImage::from_fn(dims, Channels::Gray, |_, x, _| f64::from(x) / 23.0)
        .expect("source");
    let mut set = FrameSet::new();
    for (radius, delay) in [(2.0, 12), (4.0, 12), (6.0, 120)] {
        let phi = PlanarImage::from_fn(dims, Channels::Gray, |_, x, y| {
            let dx = f64::from(x) - 12.0;
            let dy = f64::from(y) - 8.0;
            radius - dx.hypot(dy)
        })
        .expect("phi");
        set.push(compose_overlay(&phi, &source).expect("overlay"), delay)
            .expect("push");
    }
    set
}

/// Decode `bytes` by compositing every frame onto an index canvas, the
/// way a viewer honouring `Keep` disposal and transparency would.
fn decode_indexed(bytes: &[u8]) -> (Vec<Vec<u8>>, Vec<u16>, u16) {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes).expect("gif header");
    let width = usize::from(decoder.width());
    let height = usize::from(decoder.height());
    let mut canvas = vec![0_u8; width * height];
    let mut frames = Vec::new();
    let mut delays = Vec::new();

    while let Some(frame) = decoder.read_next_frame().expect("gif frame") {
        let (left, top) = (usize::from(frame.left), usize::from(frame.top));
        let fw = usize::from(frame.width);
        for (i, &index) in frame.buffer.iter().enumerate() {
            if Some(index) == frame.transparent {
                continue;
            }
            let (x, y) = (left + i % fw, top + i / fw);
            canvas[y * width + x] = index;
        }
        frames.push(canvas.clone());
        delays.push(frame.delay);
    }
    (frames, delays, decoder.width())
}

#[test]
fn decoded_animation_matches_quantized_frames() {
    let set = growing_disc();
    let quantizer = NeuQuantizer::default();
    let expected = quantizer
        .quantize(set.frames(), export::MAX_PALETTE_COLORS)
        .unwrap();

    let path = scratch_path("roundtrip.gif");
    export::export_animation(&set, &quantizer, &GifEncoder, &path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let (frames, delays, width) = decode_indexed(&bytes);
    assert_eq!(width, 24);
    assert_eq!(delays, vec![12, 12, 120]);
    assert_eq!(frames, expected.frames);
    assert!(
        frames
            .iter()
            .flatten()
            .all(|&i| i != SKIP_INDEX),
        "skip index must never survive compositing"
    );
}

#[test]
fn prepared_frames_resolve_to_quantized_frames() {
    let set = growing_disc();
    let quantizer = NeuQuantizer::default();
    let prepared = export::prepare_animation(&set, &quantizer).unwrap();
    let quantized = quantizer
        .quantize(set.frames(), export::MAX_PALETTE_COLORS)
        .unwrap();
    assert_eq!(
        export::resolve_frame_difference(&prepared.frames, prepared.skip_index),
        quantized.frames
    );
}

#[test]
fn exporting_twice_is_byte_identical() {
    let set = growing_disc();
    let first = scratch_path("first.gif");
    let second = scratch_path("second.gif");
    export::export_animation(&set, &NeuQuantizer::default(), &GifEncoder, &first).unwrap();
    export::export_animation(&set, &NeuQuantizer::default(), &GifEncoder, &second).unwrap();
    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    std::fs::remove_file(&first).ok();
    std::fs::remove_file(&second).ok();
    assert_eq!(a, b);
}

#[test]
fn single_frame_animation_round_trips() {
    let mut set = FrameSet::new();
    let dims = Dimensions::new(5, 5);
    let source = PlanarImage::from_fn(dims, Channels::Rgb, |c, _, _| {
        0.2 * (f64::from(u8::try_from(c).unwrap()) + 1.0)
    })
    .unwrap();
    let phi = PlanarImage::from_fn(dims, Channels::Gray, |_, _, _| -1.0).unwrap();
    set.push(compose_overlay(&phi, &source).unwrap(), 120).unwrap();

    let animation = export::prepare_animation(&set, &NeuQuantizer::default()).unwrap();
    let bytes = segreel_export::encode_gif(&animation).unwrap();
    let (frames, delays, _) = decode_indexed(&bytes);
    assert_eq!(delays, vec![120]);
    assert_eq!(frames, animation.frames);
}

#[test]
fn overlay_colours_survive_quantization_exactly() {
    let set = growing_disc();
    let animation = export::prepare_animation(&set, &NeuQuantizer::default()).unwrap();
    let resolved = export::resolve_frame_difference(&animation.frames, animation.skip_index);
    for (frame, indices) in set.frames().iter().zip(&resolved) {
        for (px, &i) in frame.pixels().zip(indices) {
            assert_eq!(animation.palette[usize::from(i)], px.0);
        }
    }
}
