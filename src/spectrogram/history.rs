//! Append-only store of per-frame spectral vectors.
//!
//! Frames are flattened into one growing `Vec<f32>` with a fixed stride of
//! `sample_count` bins per frame, indexed by arrival order. Appends are
//! amortized O(1) through the vector's capacity doubling; readers obtain
//! contiguous views through [`SpectralHistory::window`], which bounds-checks
//! the request instead of ever handing out a partial or zero-filled range.
//! Consistency between concurrent appenders and readers is the caller's
//! concern; the engine serializes both behind one lock.

use super::SpectrogramError;

/// Growable time-ordered spectral history.
pub struct SpectralHistory {
    sample_count: usize,
    values: Vec<f32>,
}

impl SpectralHistory {
    /// Creates an empty history holding frames of `sample_count` bins.
    pub fn new(sample_count: usize) -> Self {
        Self {
            sample_count,
            values: Vec::new(),
        }
    }

    /// Appends one frame to the end of the history.
    ///
    /// Frames are immutable once appended and never reordered. A length
    /// mismatch is a programmer error and panics.
    pub fn append(&mut self, frame: &[f32]) {
        assert_eq!(frame.len(), self.sample_count, "frame length mismatch");
        self.values.extend_from_slice(frame);
    }

    /// Number of complete frames stored.
    pub fn frame_count(&self) -> usize {
        self.values.len() / self.sample_count
    }

    /// Bins per frame.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Returns a read-only view of `count` contiguous frames starting at
    /// `start`.
    ///
    /// # Errors
    /// - `OutOfRange` if the requested range extends past `frame_count()`
    pub fn window(&self, start: usize, count: usize) -> Result<&[f32], SpectrogramError> {
        let available = self.frame_count();
        let end = start.checked_add(count).filter(|&end| end <= available);
        match end {
            Some(end) => Ok(&self.values[start * self.sample_count..end * self.sample_count]),
            None => Err(SpectrogramError::OutOfRange {
                start,
                wanted: count,
                available,
            }),
        }
    }

    /// Resets the logical length to zero, retaining capacity.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sample_count: usize, fill: f32) -> Vec<f32> {
        vec![fill; sample_count]
    }

    #[test]
    fn append_then_window_round_trips() {
        let mut history = SpectralHistory::new(4);
        history.append(&[1.0, 2.0, 3.0, 4.0]);
        history.append(&[5.0, 6.0, 7.0, 8.0]);

        let last = history.window(history.frame_count() - 1, 1).unwrap();
        assert_eq!(last, &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn stride_matches_construction() {
        let mut history = SpectralHistory::new(4);
        assert_eq!(history.sample_count(), 4);
        history.append(&[0.0; 4]);
        assert_eq!(history.sample_count(), 4);
    }

    #[test]
    fn window_spanning_multiple_frames_is_contiguous() {
        let mut history = SpectralHistory::new(2);
        for i in 0..5 {
            history.append(&frame(2, i as f32));
        }
        let view = history.window(1, 3).unwrap();
        assert_eq!(view, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn window_on_empty_history_is_out_of_range() {
        let history = SpectralHistory::new(8);
        let err = history.window(0, 10).unwrap_err();
        assert!(matches!(
            err,
            SpectrogramError::OutOfRange {
                start: 0,
                wanted: 10,
                available: 0
            }
        ));
    }

    #[test]
    fn window_past_the_end_is_out_of_range() {
        let mut history = SpectralHistory::new(2);
        history.append(&frame(2, 0.0));
        assert!(history.window(0, 1).is_ok());
        assert!(history.window(0, 2).is_err());
        assert!(history.window(1, 1).is_err());
    }

    #[test]
    fn clear_resets_frame_count() {
        let mut history = SpectralHistory::new(2);
        history.append(&frame(2, 1.0));
        history.clear();
        assert_eq!(history.frame_count(), 0);
        assert!(history.window(0, 1).is_err());
    }

    #[test]
    #[should_panic(expected = "frame length mismatch")]
    fn wrong_frame_length_panics() {
        let mut history = SpectralHistory::new(4);
        history.append(&[0.0; 3]);
    }
}
