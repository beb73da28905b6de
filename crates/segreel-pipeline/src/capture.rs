//! Per-iteration frame capture.
//!
//! [`FrameCapture`] is the observer handed to the solver. It logs
//! progress for every iteration, composites a frame every
//! `iterations_per_capture` iterations, and always composites the final
//! state so the animation ends on the converged curve.
//!
//! Progress lines go through `tracing` at `info` level. The CLI routes
//! them to stderr, which is unbuffered, so they appear while a long solve
//! is still running.

use std::num::NonZeroU32;

use crate::frames::FrameSet;
use crate::overlay::compose_overlay;
use crate::solver::{IterationEvent, IterationObserver, SolverState};
use crate::types::{PipelineError, PlanarImage};

/// Display delay of intermediate frames, in hundredths of a second.
pub const INTERMEDIATE_DELAY: u16 = 12;

/// Display delay of the final frame, in hundredths of a second.
pub const TERMINAL_DELAY: u16 = 120;

/// Errors raised while capturing a frame.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Frame storage could not grow.
    #[error("out of memory while capturing frame {frame}")]
    OutOfMemory {
        /// Index the frame would have had.
        frame: usize,
    },

    /// Compositing failed for a reason other than allocation.
    #[error("failed to composite frame {frame}: {source}")]
    Composite {
        /// Index the frame would have had.
        frame: usize,
        /// Underlying pipeline error.
        source: PipelineError,
    },
}

impl CaptureError {
    fn from_pipeline(frame: usize, err: PipelineError) -> Self {
        match err {
            PipelineError::OutOfMemory(_) => Self::OutOfMemory { frame },
            source => Self::Composite { frame, source },
        }
    }
}

/// Observer that turns solver iterations into animation frames.
///
/// Created before the solve with the original source image and consumed
/// by [`into_frames`](Self::into_frames) afterwards.
#[derive(Debug)]
pub struct FrameCapture<'a> {
    source: &'a PlanarImage,
    iterations_per_capture: NonZeroU32,
    frames: FrameSet,
}

impl<'a> FrameCapture<'a> {
    /// Start a capture run over `source`.
    #[must_use]
    pub const fn new(source: &'a PlanarImage, iterations_per_capture: NonZeroU32) -> Self {
        Self {
            source,
            iterations_per_capture,
            frames: FrameSet::new(),
        }
    }

    /// Frames captured so far.
    #[must_use]
    pub const fn frames(&self) -> &FrameSet {
        &self.frames
    }

    /// Number of frames captured so far.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Capture period in iterations.
    #[must_use]
    pub const fn iterations_per_capture(&self) -> NonZeroU32 {
        self.iterations_per_capture
    }

    /// Finish the run and hand over the captured frames.
    #[must_use]
    pub fn into_frames(self) -> FrameSet {
        self.frames
    }

    /// Whether `event` should produce a frame.
    #[must_use]
    pub const fn should_capture(&self, event: &IterationEvent<'_>) -> bool {
        event.state.is_terminal() || event.iteration % self.iterations_per_capture.get() == 0
    }

    fn capture(&mut self, phi: &PlanarImage, delay: u16) -> Result<(), CaptureError> {
        let index = self.frames.len();
        let frame = compose_overlay(phi, self.source)
            .map_err(|e| CaptureError::from_pipeline(index, e))?;
        self.frames
            .push(frame, delay)
            .map_err(|e| CaptureError::from_pipeline(index, e))?;
        tracing::debug!(frame = index, delay, "captured frame");
        Ok(())
    }
}

fn log_progress(event: &IterationEvent<'_>) {
    match event.state {
        SolverState::Running => {
            if let ([c1], [c2]) = (event.inside_mean, event.outside_mean) {
                tracing::info!(
                    "Iteration {:4}     Delta {:7.4}     c1 = {c1:6.4}     c2 = {c2:6.4}",
                    event.iteration,
                    event.delta,
                );
            } else {
                tracing::info!(
                    "Iteration {:4}     Delta {:7.4}",
                    event.iteration,
                    event.delta,
                );
            }
        }
        SolverState::Converged => {
            tracing::info!("Converged in {} iterations.", event.iteration);
        }
        SolverState::MaxIterationsReached => {
            tracing::info!("Maximum number of iterations exceeded.");
        }
    }
}

impl IterationObserver for FrameCapture<'_> {
    fn on_iteration(&mut self, event: &IterationEvent<'_>) -> Result<(), CaptureError> {
        log_progress(event);

        if !self.should_capture(event) {
            return Ok(());
        }

        let delay = if event.state.is_terminal() {
            TERMINAL_DELAY
        } else {
            INTERMEDIATE_DELAY
        };
        self.capture(event.phi, delay).inspect_err(|e| {
            tracing::error!("{e}");
        })
    }
}
