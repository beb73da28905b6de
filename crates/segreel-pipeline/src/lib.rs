//! segreel-pipeline: capture -> composite -> export pipeline (sans-IO).
//!
//! Turns the run of an iterative level-set segmentation solver into an
//! animation:
//!
//! 1. the solver reports every iteration to a [`FrameCapture`],
//! 2. selected iterations are composited into highlighted-boundary
//!    frames ([`overlay::compose_overlay`]) and appended to a
//!    [`FrameSet`],
//! 3. after the solve, [`export::export_animation`] quantizes the frames
//!    to one palette, drops pixels unchanged since the previous frame,
//!    and hands the result to an encoder.
//!
//! This crate has **no I/O dependencies** and no concrete solver,
//! quantizer, or encoder. Those collaborators plug in through
//! [`LevelSetSolver`], [`Quantizer`], and [`AnimationEncoder`].

pub mod capture;
pub mod decode;
pub mod export;
pub mod frames;
pub mod overlay;
pub mod regions;
pub mod solver;
pub mod types;

use std::num::NonZeroU32;

pub use capture::{CaptureError, FrameCapture, INTERMEDIATE_DELAY, TERMINAL_DELAY};
pub use export::{
    AnimationEncoder, BoxError, ExportError, IndexedAnimation, QuantizedFrames, Quantizer,
    SKIP_INDEX,
};
pub use frames::FrameSet;
pub use regions::{RegionMeans, binary_mask, region_averages};
pub use solver::{
    IterationEvent, IterationObserver, LevelSetSolver, SolveError, SolveOutcome, SolverOptions,
    SolverState,
};
pub use types::{
    Channels, Dimensions, GrayImage, PipelineError, PlanarImage, RgbImage, Sample,
};

/// A finished solve together with the frames captured along the way.
#[derive(Debug, Clone)]
pub struct CapturedRun {
    /// How the solver finished.
    pub outcome: SolveOutcome,
    /// Captured frames and delays, ready for export.
    pub frames: FrameSet,
}

/// Run `solver` on `phi` over `image`, capturing a frame every
/// `iterations_per_capture` iterations plus the final state.
///
/// The capture state lives only for the duration of this call.
///
/// # Errors
///
/// Returns [`SolveError::Input`] if `phi` and `image` differ in size,
/// and whatever the solver reports otherwise, including
/// [`SolveError::Aborted`] when a capture fails.
pub fn capture_solve<S: LevelSetSolver + ?Sized>(
    solver: &S,
    phi: &mut PlanarImage,
    image: &PlanarImage,
    iterations_per_capture: NonZeroU32,
) -> Result<CapturedRun, SolveError> {
    types::ensure_same_size("phi", phi.dimensions(), "image", image.dimensions())?;

    let mut capture = FrameCapture::new(image, iterations_per_capture);
    let outcome = solver.solve(phi, image, &mut capture)?;
    let frames = capture.into_frames();
    tracing::debug!(
        frames = frames.len(),
        iterations = outcome.iterations,
        "solve finished"
    );
    Ok(CapturedRun { outcome, frames })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Solver that reports a fixed number of running iterations, then
    /// converges. It leaves `phi` untouched.
    struct ScriptedSolver {
        running: u32,
        terminal: SolverState,
    }

    impl LevelSetSolver for ScriptedSolver {
        fn solve(
            &self,
            phi: &mut PlanarImage,
            image: &PlanarImage,
            observer: &mut dyn IterationObserver,
        ) -> Result<SolveOutcome, SolveError> {
            let means = region_averages(phi, image)?;
            for iteration in 0..self.running {
                observer.on_iteration(&IterationEvent {
                    state: SolverState::Running,
                    iteration,
                    delta: 1.0 / f64::from(iteration + 1),
                    inside_mean: &means.inside,
                    outside_mean: &means.outside,
                    phi: &*phi,
                })?;
            }
            observer.on_iteration(&IterationEvent {
                state: self.terminal,
                iteration: self.running,
                delta: 0.0,
                inside_mean: &means.inside,
                outside_mean: &means.outside,
                phi: &*phi,
            })?;
            Ok(SolveOutcome {
                state: self.terminal,
                iterations: self.running,
            })
        }
    }

    /// 4×4 grayscale image with a centred 2×2 inside region.
    fn centred_square() -> (PlanarImage, PlanarImage) {
        let dims = Dimensions::new(4, 4);
        let image = PlanarImage::from_fn(dims, Channels::Gray, |_, x, y| {
            if (1..3).contains(&x) && (1..3).contains(&y) { 0.9 } else { 0.1 }
        })
        .unwrap();
        let phi = PlanarImage::from_fn(dims, Channels::Gray, |_, x, y| {
            if (1..3).contains(&x) && (1..3).contains(&y) { 1.0 } else { -1.0 }
        })
        .unwrap();
        (image, phi)
    }

    #[test]
    fn three_iterations_ending_in_convergence() {
        let (image, mut phi) = centred_square();
        let solver = ScriptedSolver {
            running: 2,
            terminal: SolverState::Converged,
        };
        let run = capture_solve(&solver, &mut phi, &image, NonZeroU32::MIN).unwrap();

        assert_eq!(run.outcome.state, SolverState::Converged);
        assert_eq!(run.frames.len(), 3);
        let delays = run.frames.delays();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays.last(), Some(&TERMINAL_DELAY));
        assert!(delays[..2].iter().all(|&d| d < TERMINAL_DELAY));

        // Every pixel of the 2×2 square touches the outside, so all four
        // are fully highlighted.
        let frame = &run.frames.frames()[2];
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            assert_eq!(frame.get_pixel(x, y).0, [0, 0, 255]);
        }
    }

    #[test]
    fn max_iterations_still_captures_final_frame() {
        let (image, mut phi) = centred_square();
        let solver = ScriptedSolver {
            running: 5,
            terminal: SolverState::MaxIterationsReached,
        };
        let period = NonZeroU32::new(10).unwrap();
        let run = capture_solve(&solver, &mut phi, &image, period).unwrap();
        // Iteration 0, then the terminal frame.
        assert_eq!(run.frames.delays(), &[INTERMEDIATE_DELAY, TERMINAL_DELAY]);
    }

    #[test]
    fn mismatched_inputs_are_rejected_before_solving() {
        let (image, _) = centred_square();
        let mut phi =
            PlanarImage::from_fn(Dimensions::new(3, 3), Channels::Gray, |_, _, _| 1.0).unwrap();
        let solver = ScriptedSolver {
            running: 1,
            terminal: SolverState::Converged,
        };
        let result = capture_solve(&solver, &mut phi, &image, NonZeroU32::MIN);
        assert!(matches!(result, Err(SolveError::Input(_))));
    }
}
