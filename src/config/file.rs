//! Configuration file management for melview.
//!
//! Configuration is stored as TOML in the user's config directory. A
//! missing file falls back to defaults, which are written back so the user
//! has something to edit.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::spectrogram::EngineConfig;

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `melview list-devices`
    /// - device name from `melview list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested sample rate in Hz (the device's native rate wins)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44_100
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Spectrogram analysis and display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Samples per analysis frame (spectral bins per image column)
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Frames shown in the preview window
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,
    /// Lower analysis frequency bound in Hz
    #[serde(default = "default_freq_lo")]
    pub freq_lo_hz: f32,
    /// Upper analysis frequency bound in Hz (must stay below Nyquist)
    #[serde(default = "default_freq_hi")]
    pub freq_hi_hz: f32,
    /// Display gain applied after decibel conversion
    #[serde(default = "default_gain")]
    pub gain: f32,
    /// Decibel zero reference level
    #[serde(default = "default_zero_reference")]
    pub zero_reference: f32,
    /// Fire the export hook every this many processed frames
    #[serde(default = "default_data_export_rate")]
    pub data_export_rate: usize,
}

fn default_sample_count() -> usize {
    2048
}

fn default_buffer_count() -> usize {
    768
}

fn default_freq_lo() -> f32 {
    45.0
}

fn default_freq_hi() -> f32 {
    2000.0
}

fn default_gain() -> f32 {
    0.038
}

fn default_zero_reference() -> f32 {
    550.0
}

fn default_data_export_rate() -> usize {
    100
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            buffer_count: default_buffer_count(),
            freq_lo_hz: default_freq_lo(),
            freq_hi_hz: default_freq_hi(),
            gain: default_gain(),
            zero_reference: default_zero_reference(),
            data_export_rate: default_data_export_rate(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MelviewConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
}

impl MelviewConfig {
    /// Loads configuration from the user's config directory, creating the
    /// file with defaults on first run.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the TOML is malformed
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }
        let content = fs::read_to_string(&config_path)?;
        let config: MelviewConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// Builds the engine configuration for a given capture sample rate.
    /// Validation happens in [`EngineConfig::validate`] at engine
    /// construction.
    pub fn engine_config(&self, sample_rate: u32) -> EngineConfig {
        EngineConfig {
            sample_count: self.spectrogram.sample_count,
            buffer_count: self.spectrogram.buffer_count,
            // Dimension-preserving mel remap: one filter per spectral bin.
            filter_bank_count: self.spectrogram.sample_count,
            sample_rate,
            freq_lo: self.spectrogram.freq_lo_hz,
            freq_hi: self.spectrogram.freq_hi_hz,
            gain: self.spectrogram.gain,
            zero_reference: self.spectrogram.zero_reference,
            data_export_rate: self.spectrogram.data_export_rate,
        }
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home.join(".config").join("melview");
    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("melview.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config: MelviewConfig = toml::from_str("").unwrap();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.spectrogram.sample_count, 2048);
        assert_eq!(config.spectrogram.buffer_count, 768);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: MelviewConfig = toml::from_str(
            "[spectrogram]\nsample_count = 512\n[audio]\ndevice = \"1\"\n",
        )
        .unwrap();
        assert_eq!(config.spectrogram.sample_count, 512);
        assert_eq!(config.spectrogram.buffer_count, 768);
        assert_eq!(config.audio.device, "1");
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = MelviewConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: MelviewConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.spectrogram.gain, config.spectrogram.gain);
        assert_eq!(back.audio.sample_rate, config.audio.sample_rate);
    }

    #[test]
    fn engine_config_is_dimension_preserving_and_valid() {
        let config = MelviewConfig::default();
        let engine = config.engine_config(44_100);
        assert_eq!(engine.filter_bank_count, engine.sample_count);
        assert!(engine.validate().is_ok());
    }
}
