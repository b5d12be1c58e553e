//! Configuration management for melview.
//!
//! Handles loading and saving application configuration from a TOML file in
//! the user's config directory. Spectrogram parameters are validated when
//! the engine configuration is built, not at load time.

pub mod file;

pub use file::{AudioConfig, MelviewConfig, SpectrogramConfig};
