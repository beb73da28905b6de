//! One segmentation run: read -> solve with capture -> mask -> animation.

use std::path::PathBuf;

use segreel_chanvese::{ChanVese, init_phi};
use segreel_export::{GifEncoder, NeuQuantizer};
use segreel_pipeline::{
    Channels, ExportError, PipelineError, PlanarImage, RegionMeans, SolveError, SolveOutcome,
    binary_mask, capture_solve, export::export_animation, region_averages,
    types::ensure_same_size,
};

use crate::params::{ConfigError, Params};
use crate::raster;

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The parameter file is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An input file could not be read.
    #[error("error reading \"{}\": {source}", .path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An input file is not a supported image.
    #[error("cannot decode \"{}\": {source}", .path.display())]
    Decode {
        /// File that was decoded.
        path: PathBuf,
        /// Decoder error.
        source: PipelineError,
    },

    /// The initial level set and the source differ in size.
    #[error(transparent)]
    SizeMismatch(PipelineError),

    /// The solver failed or was aborted by the frame capture.
    #[error("segmentation failed: {0}")]
    Solve(#[from] SolveError),

    /// The binary mask could not be written.
    #[error("error writing \"{}\": {source}", .path.display())]
    WriteMask {
        /// Destination of the mask.
        path: PathBuf,
        /// Encoder or I/O error.
        source: image::ImageError,
    },

    /// The animation could not be exported.
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn print_parameters(image: &PlanarImage, custom_phi: bool, params: &Params) {
    let solver = &params.solver;
    let kind = match image.channels() {
        Channels::Gray => "grayscale",
        Channels::Rgb => "RGB",
    };
    println!("Segmentation parameters");
    println!("f         : [{} x {} {kind}]", image.width(), image.height());
    println!("phi0      : {}", if custom_phi { "custom" } else { "default" });
    println!("tol       : {}", solver.tol);
    println!("max iter  : {}", solver.max_iter);
    println!("mu        : {}", solver.mu);
    println!("nu        : {}", solver.nu);
    println!("lambda1   : {}", solver.lambda1);
    println!("lambda2   : {}", solver.lambda2);
    println!("dt        : {}", solver.dt);
    println!("datatype  : double precision float");
    println!();
}

fn format_means(means: &[f64]) -> String {
    match means {
        [v] => format!("{v:.4}"),
        _ => {
            let parts: Vec<String> = means.iter().map(|v| format!("{v:.4}")).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn print_region_averages(means: &RegionMeans) {
    println!();
    println!("Region averages");
    println!("c1        : {}", format_means(&means.inside));
    println!("c2        : {}", format_means(&means.outside));
    println!();
}

/// Execute a run described by `params`.
///
/// # Errors
///
/// Returns the first [`RunError`] encountered. A failed run leaves
/// neither the mask nor the animation behind.
pub fn run(params: &Params) -> Result<SolveOutcome, RunError> {
    let image = raster::read_source(&params.input_image)?;
    let custom = params
        .phi0
        .as_deref()
        .map(raster::read_level_set)
        .transpose()?;
    let custom_phi = custom.is_some();

    let mut phi = match custom {
        Some(phi) => {
            ensure_same_size("phi0", phi.dimensions(), "image", image.dimensions())
                .map_err(RunError::SizeMismatch)?;
            phi
        }
        None => init_phi(image.dimensions()).map_err(SolveError::from)?,
    };

    print_parameters(&image, custom_phi, params);

    let solver = ChanVese::new(params.solver.clone());
    let captured = capture_solve(&solver, &mut phi, &image, params.iter_per_frame)?;

    let means = region_averages(&phi, &image).map_err(SolveError::from)?;
    print_region_averages(&means);

    // The mask is encoded before any file is written. The animation is
    // removed again if the mask cannot be stored.
    let mask = raster::encode_mask(
        &binary_mask(&phi),
        &params.output_image,
        params.jpeg_quality,
    )?;
    export_animation(
        &captured.frames,
        &NeuQuantizer::default(),
        &GifEncoder,
        &params.output_animation,
    )?;
    if let Err(e) = raster::write_mask(&params.output_image, &mask) {
        if let Err(cleanup) = std::fs::remove_file(&params.output_animation) {
            tracing::warn!(
                path = %params.output_animation.display(),
                "cannot remove animation after failed mask write: {cleanup}"
            );
        }
        return Err(e);
    }
    tracing::info!(path = %params.output_image.display(), "wrote segmentation mask");

    println!(
        "Output written to \"{}\".",
        params.output_animation.display()
    );

    Ok(captured.outcome)
}
