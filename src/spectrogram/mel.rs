//! Mel-scale remapping of linear-frequency spectra.
//!
//! A bank of overlapping triangular filters whose center frequencies are
//! evenly spaced on the mel scale between the configured frequency bounds.
//! Each filter sums a weighted span of linear DCT bins into one output
//! value. The bank is built once at configuration time; applying it reuses
//! an internal scratch buffer and never allocates.
//!
//! Edge policy: linear bins below the lower bound or above the upper bound
//! contribute zero weight to every filter. Output bins that no filter feeds
//! stay at the 0.0 magnitude floor, which the decibel stage clamps down to
//! the decibel floor. A filter narrower than one linear bin keeps unit
//! weight at its center bin so that no filter is silently empty.

/// One triangular filter: a weighted span of linear-frequency bins.
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// Precomputed triangular mel filter bank.
pub struct MelFilterBank {
    sample_count: usize,
    filter_bank_count: usize,
    filters: Vec<MelFilter>,
    scratch: Vec<f32>,
}

impl MelFilterBank {
    /// Builds the filter bank.
    ///
    /// `sample_count` is the linear spectrum length; the DCT spreads bins
    /// uniformly from 0 Hz to Nyquist, so one bin spans
    /// `(sample_rate / 2) / sample_count` Hz. The frequency range is
    /// validated by the engine configuration before this is called.
    pub fn new(
        filter_bank_count: usize,
        sample_count: usize,
        sample_rate: u32,
        freq_lo: f32,
        freq_hi: f32,
    ) -> Self {
        let bin_hz = (sample_rate as f32 / 2.0) / sample_count as f32;
        let mel_lo = hz_to_mel(freq_lo);
        let mel_hi = hz_to_mel(freq_hi);

        // filter_bank_count + 2 breakpoints: each filter rises from point f
        // through its center at f + 1 and falls to zero at f + 2.
        let mel_step = (mel_hi - mel_lo) / (filter_bank_count + 1) as f32;
        let point = |i: usize| mel_to_hz(mel_lo + mel_step * i as f32);

        let mut filters = Vec::with_capacity(filter_bank_count);
        for f in 0..filter_bank_count {
            let start_hz = point(f);
            let center_hz = point(f + 1);
            let end_hz = point(f + 2);

            let start_bin = (start_hz / bin_hz) as usize;
            let center_bin = ((center_hz / bin_hz) as usize).min(sample_count - 1);
            let end_bin = ((end_hz / bin_hz) as usize).min(sample_count - 1);

            let mut weights = Vec::with_capacity(end_bin - start_bin + 1);
            for bin in start_bin..=end_bin {
                let freq = bin as f32 * bin_hz;
                let weight = if freq < center_hz {
                    (freq - start_hz) / (center_hz - start_hz)
                } else {
                    (end_hz - freq) / (end_hz - center_hz)
                };
                weights.push(weight.max(0.0));
            }

            // Sub-bin filter: keep unit weight at the center bin.
            if weights.iter().all(|&w| w == 0.0) {
                weights.clear();
                weights.push(1.0);
                filters.push(MelFilter {
                    start_bin: center_bin,
                    weights,
                });
            } else {
                filters.push(MelFilter { start_bin, weights });
            }
        }

        Self {
            sample_count,
            filter_bank_count,
            filters,
            scratch: vec![0.0; filter_bank_count],
        }
    }

    /// Folds a linear-frequency magnitude spectrum into mel bands, in place.
    ///
    /// The first `filter_bank_count` entries of `spectrum` receive the
    /// filter energies in filter order; any remaining entries are zeroed.
    /// With `filter_bank_count == sample_count` this is the
    /// dimension-preserving remap used by the engine.
    pub fn remap(&mut self, spectrum: &mut [f32]) {
        assert_eq!(
            spectrum.len(),
            self.sample_count,
            "spectrum length mismatch"
        );

        for (energy, filter) in self.scratch.iter_mut().zip(&self.filters) {
            let mut sum = 0.0;
            for (offset, &weight) in filter.weights.iter().enumerate() {
                let bin = filter.start_bin + offset;
                if bin < self.sample_count {
                    sum += spectrum[bin] * weight;
                }
            }
            *energy = sum;
        }

        spectrum[..self.filter_bank_count].copy_from_slice(&self.scratch);
        spectrum[self.filter_bank_count..].fill(0.0);
    }
}

/// Hz to mel scale.
#[inline]
fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel scale to Hz.
#[inline]
fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_conversions_round_trip() {
        for hz in [45.0, 440.0, 2000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() / hz < 1e-4);
        }
    }

    #[test]
    fn tone_at_filter_center_peaks_in_that_bin() {
        let mut bank = MelFilterBank::new(40, 512, 44_100, 100.0, 8000.0);
        let probe = 17;
        // The linear bin closest to the filter's center frequency carries
        // its largest weight.
        let filter = &bank.filters[probe];
        let peak_offset = filter
            .weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let tone_bin = filter.start_bin + peak_offset;

        let mut spectrum = vec![0.0f32; 512];
        spectrum[tone_bin] = 1.0;
        bank.remap(&mut spectrum);

        let peak = spectrum[..40]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, probe);
        assert!(spectrum[probe] > 0.0);
    }

    #[test]
    fn tone_outside_range_yields_floor_everywhere() {
        let mut bank = MelFilterBank::new(40, 512, 44_100, 100.0, 8000.0);
        let bin_hz = 22_050.0 / 512.0;

        // 50 Hz, below the 100 Hz lower bound.
        let low_bin = (50.0 / bin_hz) as usize;
        let mut spectrum = vec![0.0f32; 512];
        spectrum[low_bin] = 1.0;
        bank.remap(&mut spectrum);
        assert!(spectrum.iter().all(|&v| v == 0.0));

        // 10 kHz, above the 8 kHz upper bound.
        let high_bin = (10_000.0 / bin_hz) as usize;
        let mut spectrum = vec![0.0f32; 512];
        spectrum[high_bin] = 1.0;
        bank.remap(&mut spectrum);
        assert!(spectrum.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn dimension_preserving_bank_covers_every_filter() {
        // More filters than usable bins forces the sub-bin fallback path.
        let mut bank = MelFilterBank::new(256, 256, 44_100, 45.0, 2000.0);
        assert_eq!(bank.filters.len(), 256);
        assert!(bank.filters.iter().all(|f| !f.weights.is_empty()));

        let mut spectrum = vec![1.0f32; 256];
        bank.remap(&mut spectrum);
        // Every filter saw unit input, so every filter reports energy.
        assert!(spectrum.iter().take(256).any(|&v| v > 0.0));
    }

    #[test]
    fn remap_zeroes_tail_when_bank_is_smaller() {
        let mut bank = MelFilterBank::new(8, 64, 16_000, 100.0, 4000.0);
        let mut spectrum = vec![1.0f32; 64];
        bank.remap(&mut spectrum);
        assert!(spectrum[8..].iter().all(|&v| v == 0.0));
    }
}
