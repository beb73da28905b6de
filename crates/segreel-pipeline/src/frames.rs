//! Frame accumulation: captured frames and their display delays.

use crate::types::{Dimensions, PipelineError, RgbImage};

/// An append-only sequence of composited frames, each paired with a
/// display delay in hundredths of a second.
///
/// `frames.len() == delays.len()` always holds. A failed
/// [`push`](Self::push) leaves the set exactly as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<RgbImage>,
    delays: Vec<u16>,
}

impl FrameSet {
    /// Create an empty frame set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            delays: Vec::new(),
        }
    }

    /// Append a frame and its delay.
    ///
    /// Storage for both sequences is reserved before either is touched.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `frame` differs in
    /// size from the frames already stored, and
    /// [`PipelineError::OutOfMemory`] if the backing storage cannot grow.
    pub fn push(&mut self, frame: RgbImage, delay: u16) -> Result<(), PipelineError> {
        if let Some(dimensions) = self.dimensions() {
            crate::types::ensure_same_size(
                "frame",
                Dimensions::new(frame.width(), frame.height()),
                "animation",
                dimensions,
            )?;
        }
        self.frames.try_reserve(1)?;
        self.delays.try_reserve(1)?;
        self.frames.push(frame);
        self.delays.push(delay);
        Ok(())
    }

    /// Number of frames.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frame has been captured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in capture order.
    #[must_use]
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Delays in capture order, parallel to [`frames`](Self::frames).
    #[must_use]
    pub fn delays(&self) -> &[u16] {
        &self.delays
    }

    /// Shared frame size, or `None` while the set is empty.
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.frames
            .first()
            .map(|f| Dimensions::new(f.width(), f.height()))
    }
}
