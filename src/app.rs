//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate
//! command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A live mel-scaled audio spectrogram recorder
#[derive(Parser)]
#[command(name = "melview")]
#[command(version)]
#[command(about = "Record audio and render a live mel-scaled spectrogram")]
#[command(long_about = "\
Record mono audio from a system input device and accumulate a mel-scaled,
decibel-normalized spectrogram, written out as a false-color PNG.

DEFAULT COMMAND:
    If no command is specified, 'record' is used by default.
    Record options (-o, --preview) can be used without explicitly saying 'record'.

EXAMPLES:
    # Record until Ctrl-C, write a timestamped spectrogram image
    $ melview

    # Record to a chosen file and also save the final preview window
    $ melview record -o take1.png --preview take1-preview.png

    # See which input devices are available
    $ melview list-devices

    # Edit analysis parameters (frequency range, gain, frame size)
    $ melview config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/melview/melview.toml\n    Logs:               ~/.local/state/melview/melview.log.*"
)]
struct Cli {
    /// Write the full spectrogram image to this file (record default command)
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    /// Also write the final preview window image to this file (record default command)
    #[arg(long, value_name = "FILE", global = true)]
    preview: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record audio and build the spectrogram (default)
    ///
    /// Records from the configured input device until Ctrl-C, then writes
    /// the accumulated spectrogram as a PNG.
    #[command(visible_alias = "r")]
    Record {
        /// Write the full spectrogram image to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also write the final preview window image to this file
        #[arg(long, value_name = "FILE")]
        preview: Option<PathBuf>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio and spectrogram settings. Uses the $EDITOR environment
    /// variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure the
    /// correct input device in melview.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., no capture device, bad configuration)
pub fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "melview", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        Some(Commands::Record { output, preview }) => commands::handle_record(output, preview),
        Some(Commands::Config) => commands::handle_config(),
        // Default command: record, honoring the global flags
        None => commands::handle_record(cli.output, cli.preview),
        Some(Commands::Completions { .. })
        | Some(Commands::ListDevices)
        | Some(Commands::Logs) => unreachable!("handled above"),
    }
}
