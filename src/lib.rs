//! melview: live mel-scaled audio spectrogram recording.
//!
//! The [`spectrogram`] module tree is the signal-processing and
//! image-synthesis core; [`capture`] feeds it fixed-size frames from a
//! system input device, and [`app`]/[`commands`] wrap both in a CLI.

pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod logging;
pub mod spectrogram;
