//! Application command handlers for melview.
//!
//! This module organizes command handling into separate submodules, each
//! responsible for a specific application command.
//!
//! # Commands
//! - `record`: Live spectrogram recording with image output
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod record;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use record::handle_record;
