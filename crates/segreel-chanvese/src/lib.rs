//! segreel-chanvese: two-phase Chan-Vese segmentation.
//!
//! Minimizes the Chan-Vese energy
//!
//! ```text
//! mu·Length(C) + nu·Area(inside(C))
//!   + lambda1·∫_inside |f − c1|² + lambda2·∫_outside |f − c2|²
//! ```
//!
//! with a semi-implicit Gauss-Seidel sweep over the level-set function
//! `phi`. The curve `C` is the zero level; `phi >= 0` is inside. After
//! every sweep the region means `c1` and `c2` are recomputed and the
//! iteration is reported to an [`IterationObserver`].

use std::f64::consts::PI;

use segreel_pipeline::{
    Channels, Dimensions, IterationEvent, IterationObserver, LevelSetSolver, PipelineError,
    PlanarImage, RegionMeans, SolveError, SolveOutcome, SolverOptions, SolverState,
    region_averages, types::ensure_same_size,
};

/// Regularization of the curvature divisors.
const ETA: f64 = 1e-16;

/// Period of the default initial checkerboard, in pixels.
const INIT_PERIOD: f64 = 5.0;

/// Default initial level set: `sin(πx/5)·sin(πy/5)`.
///
/// A fine checkerboard of small cells that lets the curve find interior
/// boundaries quickly.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if either dimension is zero.
pub fn init_phi(dimensions: Dimensions) -> Result<PlanarImage, PipelineError> {
    PlanarImage::from_fn(dimensions, Channels::Gray, |_, x, y| {
        (PI * f64::from(x) / INIT_PERIOD).sin() * (PI * f64::from(y) / INIT_PERIOD).sin()
    })
}

/// Chan-Vese solver.
#[derive(Debug, Clone, PartialEq)]
pub struct ChanVese {
    options: SolverOptions,
}

impl ChanVese {
    /// Create a solver with the given options.
    #[must_use]
    pub const fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// One Gauss-Seidel sweep over `phi`. Returns the RMS change.
    #[allow(clippy::cast_precision_loss, clippy::similar_names)]
    fn sweep(&self, phi: &mut PlanarImage, image: &PlanarImage, means: &RegionMeans) -> f64 {
        let SolverOptions {
            mu,
            nu,
            lambda1,
            lambda2,
            dt,
            ..
        } = self.options;
        let width = phi.width() as usize;
        let height = phi.height() as usize;
        let channels = image.channels().count();
        let pixels = width * height;
        let source = image.data();
        let values = phi.data_mut();
        let divisor = |gx: f64, gy: f64| 1.0 / gx.mul_add(gx, gy.mul_add(gy, ETA)).sqrt();
        let mut diff_sum = 0.0;

        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let l = if x > 0 { i - 1 } else { i };
                let r = if x + 1 < width { i + 1 } else { i };
                let u = if y > 0 { i - width } else { i };
                let d = if y + 1 < height { i + width } else { i };

                let c = values[i];
                let (pl, pr, pu, pd) = (values[l], values[r], values[u], values[d]);

                let div_r = divisor(pr - c, (pd - pu) / 2.0);
                let div_l = divisor(c - pl, (pd - pu) / 2.0);
                let div_d = divisor((pr - pl) / 2.0, pd - c);
                let div_u = divisor((pr - pl) / 2.0, c - pu);

                let mut dist1 = 0.0;
                let mut dist2 = 0.0;
                for ch in 0..channels {
                    let f = source[ch * pixels + i];
                    dist1 += (f - means.inside[ch]).powi(2);
                    dist2 += (f - means.outside[ch]).powi(2);
                }

                let delta = dt / (PI * c.mul_add(c, 1.0));
                let pull = pr.mul_add(div_r, pl.mul_add(div_l, pd.mul_add(div_d, pu * div_u)));
                let force = mu.mul_add(pull, lambda2.mul_add(dist2, -nu - lambda1 * dist1));
                let weight = (delta * mu).mul_add(div_r + div_l + div_d + div_u, 1.0);
                let next = delta.mul_add(force, c) / weight;

                diff_sum += (next - c).powi(2);
                values[i] = next;
            }
        }

        (diff_sum / pixels as f64).sqrt()
    }
}

impl Default for ChanVese {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

impl LevelSetSolver for ChanVese {
    fn solve(
        &self,
        phi: &mut PlanarImage,
        image: &PlanarImage,
        observer: &mut dyn IterationObserver,
    ) -> Result<SolveOutcome, SolveError> {
        ensure_same_size("phi", phi.dimensions(), "image", image.dimensions())?;
        if phi.channels() != Channels::Gray {
            let err = PipelineError::InvalidImage("phi must have a single channel".to_owned());
            return Err(err.into());
        }
        tracing::debug!(options = ?self.options, "chan-vese solve");

        let mut means = region_averages(phi, image)?;
        observer.on_iteration(&IterationEvent {
            state: SolverState::Running,
            iteration: 0,
            delta: -1.0,
            inside_mean: &means.inside,
            outside_mean: &means.outside,
            phi: &*phi,
        })?;

        let max_iter = self.options.max_iter;
        let mut outcome = SolveOutcome {
            state: SolverState::MaxIterationsReached,
            iterations: max_iter,
        };
        let mut delta = -1.0;

        for iteration in 1..=max_iter {
            delta = self.sweep(phi, image, &means);
            means = region_averages(phi, image)?;

            if iteration >= 2 && delta <= self.options.tol {
                outcome = SolveOutcome {
                    state: SolverState::Converged,
                    iterations: iteration,
                };
                break;
            }

            observer.on_iteration(&IterationEvent {
                state: SolverState::Running,
                iteration,
                delta,
                inside_mean: &means.inside,
                outside_mean: &means.outside,
                phi: &*phi,
            })?;
        }

        observer.on_iteration(&IterationEvent {
            state: outcome.state,
            iteration: outcome.iterations,
            delta,
            inside_mean: &means.inside,
            outside_mean: &means.outside,
            phi: &*phi,
        })?;
        Ok(outcome)
    }
}
