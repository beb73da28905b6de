//! Parameter file ingestion.
//!
//! The parameter file is a list of `key = value` lines:
//!
//! ```text
//! # Chan-Vese run
//! inputImage      = input.png
//! outputImage     = mask.png
//! outputAnimation = evolution.gif
//! mu              = 0.2
//! iterPerFrame    = 5
//! ```
//!
//! `#` starts a comment, blank lines and `[section]` headers are skipped,
//! and values may be wrapped in single or double quotes. Unknown keys are
//! ignored.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use segreel_pipeline::SolverOptions;
use serde::Serialize;

/// Default JPEG quality for the mask when `outputImage` is a JPEG.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Default number of solver iterations between captured frames.
pub const DEFAULT_ITER_PER_FRAME: u32 = 10;

/// Errors raised while reading or validating a parameter file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The parameter file could not be read.
    #[error("cannot read parameter file \"{}\": {source}", .path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A non-blank, non-comment line has no `=`.
    #[error("line {line}: expected `key = value`, got \"{text}\"")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// A value could not be parsed as the key's type.
    #[error("invalid value for {key}: \"{value}\"")]
    InvalidValue {
        /// Parameter name.
        key: &'static str,
        /// Raw value from the file.
        value: String,
    },

    /// A required key is absent.
    #[error("missing required parameter \"{0}\"")]
    MissingKey(&'static str),

    /// A value parsed but lies outside its valid range.
    #[error("{key} = {value} is out of range (expected {expected})")]
    OutOfRange {
        /// Parameter name.
        key: &'static str,
        /// Parsed value.
        value: String,
        /// Human-readable valid range.
        expected: &'static str,
    },
}

/// Everything a run needs, parsed from a parameter file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    /// Image to segment.
    pub input_image: PathBuf,
    /// Where the binary mask is written.
    pub output_image: PathBuf,
    /// Where the animated GIF is written.
    pub output_animation: PathBuf,
    /// Optional initial level set image.
    pub phi0: Option<PathBuf>,
    /// Solver options.
    pub solver: SolverOptions,
    /// Iterations between captured frames.
    pub iter_per_frame: NonZeroU32,
    /// JPEG quality for the mask, `0..=100`.
    pub jpeg_quality: u8,
}

/// Strip a trailing comment and surrounding quotes from a raw value.
fn clean_value(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote)
            && let Some(end) = rest.find(quote)
        {
            return &rest[..end];
        }
    }
    raw.split_once('#').map_or(raw, |(value, _)| value).trim()
}

/// Split `text` into its `key = value` pairs. Later keys override earlier ones.
fn entries(text: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut map = BTreeMap::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: n + 1,
                text: line.to_owned(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Syntax {
                line: n + 1,
                text: line.to_owned(),
            });
        }
        map.insert(key.to_owned(), clean_value(value).to_owned());
    }
    Ok(map)
}

struct Entries(BTreeMap<String, String>);

impl Entries {
    fn path(&mut self, key: &'static str) -> Option<PathBuf> {
        self.0
            .remove(key)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn required_path(&mut self, key: &'static str) -> Result<PathBuf, ConfigError> {
        self.path(key).ok_or(ConfigError::MissingKey(key))
    }

    fn float(&mut self, key: &'static str, default: f64) -> Result<f64, ConfigError> {
        let Some(raw) = self.0.remove(key) else {
            return Ok(default);
        };
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        }
    }

    fn int(&mut self, key: &'static str, default: i64) -> Result<i64, ConfigError> {
        let Some(raw) = self.0.remove(key) else {
            return Ok(default);
        };
        raw.parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw })
    }

    fn positive(&mut self, key: &'static str, default: u32) -> Result<NonZeroU32, ConfigError> {
        let value = self.int(key, i64::from(default))?;
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| ConfigError::OutOfRange {
                key,
                value: value.to_string(),
                expected: "1 to 4294967295",
            })
    }
}

impl Params {
    /// Parse parameter file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed lines, unparsable or
    /// out-of-range values, and missing required keys.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = Entries(entries(text)?);

        let input_image = entries.required_path("inputImage")?;
        let output_image = entries.required_path("outputImage")?;
        let output_animation = entries.required_path("outputAnimation")?;
        let phi0 = entries.path("phi0");

        let solver = SolverOptions {
            mu: entries.float("mu", SolverOptions::DEFAULT_MU)?,
            nu: entries.float("nu", SolverOptions::DEFAULT_NU)?,
            lambda1: entries.float("lambda1", SolverOptions::DEFAULT_LAMBDA1)?,
            lambda2: entries.float("lambda2", SolverOptions::DEFAULT_LAMBDA2)?,
            tol: entries.float("tol", SolverOptions::DEFAULT_TOL)?,
            max_iter: entries.positive("maxIter", SolverOptions::DEFAULT_MAX_ITER)?.get(),
            dt: entries.float("dt", SolverOptions::DEFAULT_DT)?,
        };
        let iter_per_frame = entries.positive("iterPerFrame", DEFAULT_ITER_PER_FRAME)?;

        let quality = entries.int("jpegQuality", i64::from(DEFAULT_JPEG_QUALITY))?;
        let jpeg_quality = u8::try_from(quality)
            .ok()
            .filter(|q| *q <= 100)
            .ok_or_else(|| ConfigError::OutOfRange {
                key: "jpegQuality",
                value: quality.to_string(),
                expected: "0 to 100",
            })?;

        for key in entries.0.keys() {
            tracing::debug!(key = key.as_str(), "ignoring unrecognized parameter");
        }

        Ok(Self {
            input_image,
            output_image,
            output_animation,
            phi0,
            solver,
            iter_per_frame,
            jpeg_quality,
        })
    }

    /// Read and parse a parameter file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, and
    /// everything [`parse`](Self::parse) returns.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Echo the effective parameters as `--> key = value` lines.
    pub fn log(&self) {
        let solver = &self.solver;
        let echo = |key: &str, value: &dyn std::fmt::Display| {
            tracing::info!("--> {key:<10} = {value}");
        };
        echo("mu", &format_args!("{:.6}", solver.mu));
        echo("nu", &format_args!("{:.6}", solver.nu));
        echo("lambda1", &format_args!("{:.6}", solver.lambda1));
        echo("lambda2", &format_args!("{:.6}", solver.lambda2));
        echo("tol", &format_args!("{:.6}", solver.tol));
        echo("maxIter", &solver.max_iter);
        echo("dt", &format_args!("{:.6}", solver.dt));
        echo("iterPerFrame", &self.iter_per_frame);
        echo("jpegQuality", &self.jpeg_quality);
        echo("inputImage", &self.input_image.display());
        echo("outputImage", &self.output_image.display());
        echo("outputAnimation", &self.output_animation.display());
        if let Some(phi0) = &self.phi0 {
            echo("phi0", &phi0.display());
        }

        match serde_json::to_string(self) {
            Ok(json) => tracing::debug!(params = %json, "effective parameters"),
            Err(e) => tracing::debug!("cannot serialize parameters: {e}"),
        }
    }
}
