//! The contract between a level-set solver and the capture pipeline.
//!
//! A solver evolves the boundary field in place and reports every
//! iteration to an [`IterationObserver`]. The observer sees a read-only
//! [`IterationEvent`]; returning an error from
//! [`on_iteration`](IterationObserver::on_iteration) halts the solve.
//!
//! # Strategy pattern
//!
//! The pipeline never depends on a concrete solver. The CLI wires in a
//! Chan-Vese implementation; tests drive the observer with scripted
//! solvers.

use serde::{Deserialize, Serialize};

use crate::capture::CaptureError;
use crate::types::{Dimensions, PlanarImage};

/// Where the solver is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverState {
    /// An intermediate iteration; more will follow.
    Running,
    /// The solver met its convergence tolerance. Final event.
    Converged,
    /// The solver hit its iteration cap. Final event.
    MaxIterationsReached,
}

impl SolverState {
    /// Returns `true` for the final event of a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One solver iteration, as reported to the observer.
#[derive(Debug, Clone, Copy)]
pub struct IterationEvent<'a> {
    /// Run state at this iteration.
    pub state: SolverState,
    /// Iteration number. The initial state is reported as iteration 0.
    pub iteration: u32,
    /// Root-mean-square change of the boundary field during this
    /// iteration, or a negative value when not yet measured.
    pub delta: f64,
    /// Per-channel mean of the source image inside the curve.
    pub inside_mean: &'a [f64],
    /// Per-channel mean of the source image outside the curve.
    pub outside_mean: &'a [f64],
    /// The current boundary field (single channel).
    pub phi: &'a PlanarImage,
}

impl IterationEvent<'_> {
    /// Size of the boundary field.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.phi.dimensions()
    }

    /// Number of source image channels.
    #[must_use]
    pub const fn channel_count(&self) -> usize {
        self.inside_mean.len()
    }
}

/// Receiver of per-iteration solver events.
pub trait IterationObserver {
    /// Handle one iteration.
    ///
    /// # Errors
    ///
    /// Any error stops the solver, which must propagate it unchanged.
    fn on_iteration(&mut self, event: &IterationEvent<'_>) -> Result<(), CaptureError>;
}

/// Numeric options for a level-set solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Boundary length penalty.
    pub mu: f64,
    /// Region area penalty.
    pub nu: f64,
    /// Fit weight inside the curve.
    pub lambda1: f64,
    /// Fit weight outside the curve.
    pub lambda2: f64,
    /// Convergence tolerance on the RMS change of the field.
    pub tol: f64,
    /// Maximum number of iterations.
    pub max_iter: u32,
    /// Time step.
    pub dt: f64,
}

impl SolverOptions {
    /// Default length penalty.
    pub const DEFAULT_MU: f64 = 0.25;
    /// Default area penalty.
    pub const DEFAULT_NU: f64 = 0.0;
    /// Default inside fit weight.
    pub const DEFAULT_LAMBDA1: f64 = 1.0;
    /// Default outside fit weight.
    pub const DEFAULT_LAMBDA2: f64 = 1.0;
    /// Default convergence tolerance.
    pub const DEFAULT_TOL: f64 = 1e-3;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITER: u32 = 500;
    /// Default time step.
    pub const DEFAULT_DT: f64 = 0.5;
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            mu: Self::DEFAULT_MU,
            nu: Self::DEFAULT_NU,
            lambda1: Self::DEFAULT_LAMBDA1,
            lambda2: Self::DEFAULT_LAMBDA2,
            tol: Self::DEFAULT_TOL,
            max_iter: Self::DEFAULT_MAX_ITER,
            dt: Self::DEFAULT_DT,
        }
    }
}

/// How a completed solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOutcome {
    /// [`SolverState::Converged`] or [`SolverState::MaxIterationsReached`].
    pub state: SolverState,
    /// Iteration number reported with the final event.
    pub iterations: u32,
}

/// Errors a solver can report.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// The observer rejected an iteration.
    #[error("solve aborted: {0}")]
    Aborted(#[from] CaptureError),

    /// The boundary field and the image differ in size.
    #[error(transparent)]
    Input(#[from] crate::types::PipelineError),
}

/// A level-set segmentation solver.
pub trait LevelSetSolver {
    /// Evolve `phi` over `image`, reporting each iteration to `observer`.
    ///
    /// Implementations must send exactly one terminal event
    /// ([`SolverState::Converged`] or
    /// [`SolverState::MaxIterationsReached`]) as the last call when the
    /// run completes.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Aborted`] when the observer fails and
    /// [`SolveError::Input`] for inconsistent inputs.
    fn solve(
        &self,
        phi: &mut PlanarImage,
        image: &PlanarImage,
        observer: &mut dyn IterationObserver,
    ) -> Result<SolveOutcome, SolveError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = SolverOptions::default();
        assert!((opts.mu - 0.25).abs() < f64::EPSILON);
        assert!(opts.nu.abs() < f64::EPSILON);
        assert!((opts.lambda1 - 1.0).abs() < f64::EPSILON);
        assert!((opts.lambda2 - 1.0).abs() < f64::EPSILON);
        assert!((opts.tol - 1e-3).abs() < f64::EPSILON);
        assert_eq!(opts.max_iter, 500);
        assert!((opts.dt - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn terminal_states() {
        assert!(!SolverState::Running.is_terminal());
        assert!(SolverState::Converged.is_terminal());
        assert!(SolverState::MaxIterationsReached.is_terminal());
    }

    #[test]
    fn options_serde_round_trip() {
        let opts = SolverOptions {
            mu: 0.5,
            tol: 1e-5,
            max_iter: 20,
            ..SolverOptions::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: SolverOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(opts, back);
    }
}
