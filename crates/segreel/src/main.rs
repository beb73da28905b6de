//! segreel: segment an image with Chan-Vese and write the evolving curve
//! as an animated GIF.
//!
//! ```text
//! segreel params.txt
//! ```
//!
//! Progress goes to stderr through `tracing` (filter with `RUST_LOG`);
//! the parameter summary and region averages go to stdout.

mod params;
mod raster;
mod run;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::params::Params;
use crate::run::RunError;

/// Chan-Vese segmentation with an animated GIF of the curve evolution.
///
/// The parameter file holds `key = value` lines. Required keys:
/// inputImage, outputImage (binary mask), outputAnimation (GIF).
/// Optional: mu (0.25), nu (0.0), lambda1 (1.0), lambda2 (1.0),
/// phi0 (initial level set image), tol (1e-3), maxIter (500), dt (0.5),
/// iterPerFrame (10), jpegQuality (85).
#[derive(Parser)]
#[command(name = "segreel", version)]
struct Cli {
    /// Parameter file.
    #[arg(value_name = "PARAM_FILE")]
    param_file: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot install log subscriber: {e}");
    }
}

fn try_main(cli: &Cli) -> Result<(), RunError> {
    let params = Params::from_file(&cli.param_file)?;
    params.log();
    let outcome = run::run(&params)?;
    tracing::debug!(state = ?outcome.state, iterations = outcome.iterations, "run complete");
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // Help and version go to stdout.
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing();

    match try_main(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Must reach stderr even with `RUST_LOG=off`.
            eprintln!("Error: {e}");
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
