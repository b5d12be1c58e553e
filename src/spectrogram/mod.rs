//! Spectrogram synthesis core for melview.
//!
//! Turns fixed-size frames of 16-bit mono audio into a growing mel-scaled,
//! decibel-normalized spectral history and renders it as false-color raster
//! images. The pipeline per frame is window → DCT-II magnitude → mel remap →
//! decibel/gain normalization → history append; rendering applies a cached
//! color lookup table and interleaves the planar channels into an RGB image.
//!
//! This module tree has no dependency on audio capture or the CLI and is
//! usable as a standalone library surface.

pub mod color;
pub mod engine;
pub mod history;
pub mod mel;
pub mod transform;

pub use color::{PixelFormat, Raster};
pub use engine::SpectrogramEngine;
pub use history::SpectralHistory;

use thiserror::Error;

/// Errors surfaced by the spectrogram core.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    /// Invalid engine configuration; fatal at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A history window request extends past the available frames.
    #[error("window [{start}, {start}+{wanted}) exceeds {available} available frames")]
    OutOfRange {
        start: usize,
        wanted: usize,
        available: usize,
    },

    /// The requested channel/bit-depth combination has no raster representation.
    #[error("unsupported pixel format: {channels} channels at {bits} bits per channel")]
    FormatUnsupported { channels: u8, bits: u8 },

    /// Capture hardware/authorization not ready when a start was requested.
    #[error("audio capture is not available")]
    CaptureUnavailable,
}

/// Decibel value assigned to magnitudes at or below zero during
/// normalization, instead of propagating `-inf` or NaN.
pub const MIN_DECIBELS: f32 = -100.0;

/// Engine configuration, validated once at construction.
///
/// Defaults match the recording tool this core drives: 2048-sample frames,
/// a 768-frame preview window, and a 45–2000 Hz analysis range that favors
/// resolution at low guitar frequencies.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Samples per frame; also the number of spectral bins per history row.
    pub sample_count: usize,
    /// Frames in the preview window (the displayed image height).
    pub buffer_count: usize,
    /// Number of mel filters; at most `sample_count`, and equal to it for a
    /// dimension-preserving remap.
    pub filter_bank_count: usize,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Lower bound of the analysis frequency range in Hz.
    pub freq_lo: f32,
    /// Upper bound of the analysis frequency range in Hz. Must stay below
    /// the Nyquist frequency of `sample_rate`.
    pub freq_hi: f32,
    /// Display gain applied after decibel conversion.
    pub gain: f32,
    /// Reference level for decibel conversion.
    pub zero_reference: f32,
    /// Fire the export hook every this many processed frames.
    pub data_export_rate: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_count: 2048,
            buffer_count: 768,
            filter_bank_count: 2048,
            sample_rate: 44_100,
            freq_lo: 45.0,
            freq_hi: 2000.0,
            gain: 0.038,
            zero_reference: 550.0,
            data_export_rate: 100,
        }
    }
}

impl EngineConfig {
    /// Stream advance between successive frames, in samples; frames overlap
    /// by `sample_count - hop_count()`.
    pub fn hop_count(&self) -> usize {
        (self.sample_count + 1) / 2
    }

    /// Nyquist frequency of the configured sample rate.
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// - If any count is zero
    /// - If the filter bank is wider than the frame
    /// - If the frequency range is not `0 < lo < hi < Nyquist`
    /// - If gain or zero reference are not positive
    pub fn validate(&self) -> Result<(), SpectrogramError> {
        if self.sample_count == 0 || self.buffer_count == 0 || self.filter_bank_count == 0 {
            return Err(SpectrogramError::Configuration(
                "sample, buffer, and filter bank counts must be positive".into(),
            ));
        }
        if self.filter_bank_count > self.sample_count {
            return Err(SpectrogramError::Configuration(format!(
                "filter bank count {} exceeds the {} spectral bins per frame",
                self.filter_bank_count, self.sample_count
            )));
        }
        if self.data_export_rate == 0 {
            return Err(SpectrogramError::Configuration(
                "data export rate must be positive".into(),
            ));
        }
        if !(self.freq_lo > 0.0 && self.freq_lo < self.freq_hi && self.freq_hi < self.nyquist()) {
            return Err(SpectrogramError::Configuration(format!(
                "frequency range {}..{} Hz must satisfy 0 < lo < hi < Nyquist ({} Hz)",
                self.freq_lo,
                self.freq_hi,
                self.nyquist()
            )));
        }
        if self.gain <= 0.0 || self.zero_reference <= 0.0 {
            return Err(SpectrogramError::Configuration(
                "gain and zero reference must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_frequency_range() {
        let config = EngineConfig {
            freq_lo: 2000.0,
            freq_hi: 45.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SpectrogramError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_range_above_nyquist() {
        let config = EngineConfig {
            sample_rate: 8000,
            freq_hi: 6000.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_counts() {
        let config = EngineConfig {
            sample_count: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_filter_bank_wider_than_frame() {
        // The remap reduces or preserves dimensionality, never widens it.
        let config = EngineConfig {
            sample_count: 64,
            filter_bank_count: 128,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SpectrogramError::Configuration(_))
        ));
    }

    #[test]
    fn hop_is_half_the_frame() {
        let config = EngineConfig::default();
        assert_eq!(config.hop_count(), 1024);
    }
}
