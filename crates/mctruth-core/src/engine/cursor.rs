/// Read position of the secondary scan.
///
/// The cursor only ever moves forward: each primary resumes at the batch where
/// the previous primary found its hits or hit the boundary of its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForwardCursor {
    position: usize,
}

impl ForwardCursor {
    pub fn start() -> Self {
        Self::default()
    }

    #[inline]
    pub fn position(self) -> usize {
        self.position
    }

    /// Cursor resumed at `position`. Never moves backwards.
    pub fn resume_at(self, position: usize) -> Self {
        Self {
            position: self.position.max(position),
        }
    }
}

/// Read position of the primary scan, running from the last batch towards the first.
///
/// `None` means the scan has run past the first batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackwardCursor {
    position: Option<usize>,
}

impl BackwardCursor {
    /// Cursor on the last of `batch_count` batches.
    pub fn at_end(batch_count: usize) -> Self {
        Self {
            position: batch_count.checked_sub(1),
        }
    }

    #[inline]
    pub fn position(self) -> Option<usize> {
        self.position
    }

    #[inline]
    pub fn is_exhausted(self) -> bool {
        self.position.is_none()
    }

    /// Returns the current position and moves one batch towards the start.
    pub fn retreat(&mut self) -> Option<usize> {
        let current = self.position?;
        self.position = current.checked_sub(1);
        Some(current)
    }

    /// Moves back onto the batch read last, so that the next primary examines it again.
    pub fn step_forward(&mut self) {
        self.position = Some(self.position.map_or(0, |p| p + 1));
    }
}
