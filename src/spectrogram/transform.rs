//! Windowed DCT-II magnitude transform and decibel normalization.
//!
//! The transform widens each 16-bit sample to `f32`, multiplies by a
//! precomputed Hann window, applies a fixed-size type-II discrete cosine
//! transform, and takes the magnitude of the result. All buffers are sized
//! at construction; the per-frame path does not allocate.

use std::sync::Arc;

use rustdct::{DctPlanner, TransformType2And3};

use super::MIN_DECIBELS;

/// Fixed-size windowed spectral transform.
pub struct WindowedTransform {
    sample_count: usize,
    /// Denormalized full Hann window, immutable for the transform's lifetime.
    window: Vec<f32>,
    dct: Arc<dyn TransformType2And3<f32>>,
    scratch: Vec<f32>,
}

impl WindowedTransform {
    /// Plans a DCT-II of length `sample_count` and precomputes the analysis
    /// window.
    pub fn new(sample_count: usize) -> Self {
        let mut planner = DctPlanner::new();
        let dct = planner.plan_dct2(sample_count);
        let scratch = vec![0.0; dct.get_scratch_len()];
        Self {
            sample_count,
            window: hann_window(sample_count),
            dct,
            scratch,
        }
    }

    /// Transforms one frame of samples into its magnitude spectrum.
    ///
    /// Writes `sample_count` non-negative values into `spectrum`. A length
    /// mismatch on either slice is a programmer error and panics.
    pub fn transform(&mut self, frame: &[i16], spectrum: &mut [f32]) {
        assert_eq!(frame.len(), self.sample_count, "frame length mismatch");
        assert_eq!(spectrum.len(), self.sample_count, "spectrum length mismatch");

        for ((out, &sample), &weight) in
            spectrum.iter_mut().zip(frame).zip(&self.window)
        {
            *out = sample as f32 * weight;
        }

        self.dct.process_dct2_with_scratch(spectrum, &mut self.scratch);

        for value in spectrum.iter_mut() {
            *value = value.abs();
        }
    }
}

/// Denormalized full Hann window: `0.5 − 0.5·cos(2πn/N)`.
fn hann_window(count: usize) -> Vec<f32> {
    (0..count)
        .map(|n| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / count as f32).cos()
        })
        .collect()
}

/// Converts magnitudes to decibels relative to `zero_reference`, then scales
/// by `gain`, in place.
///
/// Magnitudes at or below zero clamp to [`MIN_DECIBELS`] rather than
/// producing `-inf` or NaN. `zero_reference` and `gain` are validated
/// positive at engine construction.
pub fn normalize(spectrum: &mut [f32], zero_reference: f32, gain: f32) {
    for value in spectrum.iter_mut() {
        let db = if *value > 0.0 {
            20.0 * (*value / zero_reference).log10()
        } else {
            MIN_DECIBELS
        };
        *value = db.max(MIN_DECIBELS) * gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_full_length_and_non_negative() {
        let mut transform = WindowedTransform::new(256);
        let frame: Vec<i16> = (0..256).map(|i| ((i * 37) % 1024) as i16 - 512).collect();
        let mut spectrum = vec![0.0f32; 256];
        transform.transform(&frame, &mut spectrum);

        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn silence_transforms_to_zero() {
        let mut transform = WindowedTransform::new(128);
        let mut spectrum = vec![1.0f32; 128];
        transform.transform(&[0i16; 128], &mut spectrum);
        assert!(spectrum.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn constant_signal_concentrates_in_dc_bin() {
        let mut transform = WindowedTransform::new(128);
        let mut spectrum = vec![0.0f32; 128];
        transform.transform(&[1000i16; 128], &mut spectrum);

        let dc = spectrum[0];
        assert!(dc > 0.0);
        // Window sidelobes fall off fast; far bins carry a fraction of DC.
        assert!(spectrum[64] < dc / 100.0);
    }

    #[test]
    #[should_panic(expected = "frame length mismatch")]
    fn wrong_frame_length_panics() {
        let mut transform = WindowedTransform::new(64);
        let mut spectrum = vec![0.0f32; 64];
        transform.transform(&[0i16; 32], &mut spectrum);
    }

    #[test]
    fn normalize_clamps_non_positive_to_floor() {
        let mut spectrum = vec![0.0, -1.0, 550.0];
        normalize(&mut spectrum, 550.0, 1.0);
        assert_eq!(spectrum[0], MIN_DECIBELS);
        assert_eq!(spectrum[1], MIN_DECIBELS);
        assert!(spectrum[2].abs() < 1e-4); // 20·log10(1) = 0
    }

    #[test]
    fn normalize_applies_gain() {
        let mut spectrum = vec![5500.0];
        normalize(&mut spectrum, 550.0, 0.5);
        // 20·log10(10) = 20 dB, scaled by 0.5
        assert!((spectrum[0] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn normalize_preserves_elementwise_order() {
        let mut a = vec![10.0, 200.0, 0.0, 3000.0];
        let mut b = vec![5.0, 200.0, 0.0, 2999.0];
        normalize(&mut a, 550.0, 0.038);
        normalize(&mut b, 550.0, 0.038);
        for (x, y) in a.iter().zip(&b) {
            assert!(x >= y);
        }
    }
}
