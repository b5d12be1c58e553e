//! Live spectrogram recording command.
//!
//! Wires the capture collaborator to the spectrogram engine: a dedicated
//! worker thread drains the frame channel and feeds the engine sequentially,
//! while the main thread owns start/stop control and polls the engine's
//! revision counter for the status line. On Ctrl-C the run is stopped, the
//! full spectrogram is rendered, and the image is written to disk.

use anyhow::Result;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::capture::AudioCapture;
use crate::config::MelviewConfig;
use crate::spectrogram::SpectrogramEngine;

/// Records audio until Ctrl-C and writes the full spectrogram as a PNG.
///
/// # Arguments
/// * `output` - Destination for the full spectrogram image; defaults to a
///   timestamped file in the current directory
/// * `preview` - Optional destination for the final preview window image
///
/// # Errors
/// - If no capture device is available or the stream fails
/// - If the spectrogram configuration is invalid
/// - If an image cannot be written
pub fn handle_record(output: Option<PathBuf>, preview: Option<PathBuf>) -> Result<()> {
    let config = MelviewConfig::load_or_default()?;

    let mut capture = AudioCapture::open(&config.audio.device, config.audio.sample_rate)?;
    let engine_config = config.engine_config(capture.sample_rate());
    let sample_count = engine_config.sample_count;
    let hop = engine_config.hop_count();

    let mut engine = SpectrogramEngine::new(engine_config)?;
    engine.set_capture_ready(true);
    let engine = Arc::new(Mutex::new(engine));

    // One worker feeds the engine; frames stay strictly ordered.
    let (frame_tx, frame_rx) = mpsc::channel::<Vec<i16>>();
    let worker_engine = Arc::clone(&engine);
    let worker = thread::spawn(move || {
        for frame in frame_rx {
            worker_engine.lock().unwrap().on_frame(&frame);
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })?;
    }

    engine.lock().unwrap().set_running(true);
    capture.start(sample_count, hop, frame_tx)?;

    println!("Recording... press Ctrl-C to stop.");
    let mut last_revision = 0;
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(250));
        let engine = engine.lock().unwrap();
        if engine.revision() != last_revision {
            last_revision = engine.revision();
            print!(
                "\r  {:>7.1}s  {} frames ",
                engine.current_duration().as_secs_f32(),
                engine.frame_count()
            );
            io::stdout().flush().ok();
        }
    }
    println!();

    // Closing the stream drops the sender; the worker drains what is left.
    capture.stop();
    if worker.join().is_err() {
        tracing::error!("Frame worker panicked");
    }

    let mut engine = engine.lock().unwrap();
    engine.set_running(false);

    let full = engine.cached_full();
    if full.is_empty() {
        tracing::warn!("Recording stopped with no frames captured");
        println!("Nothing recorded; no image written.");
        return Ok(());
    }

    let output = output.unwrap_or_else(default_output_path);
    full.save_png(&output)?;
    tracing::info!(
        "Spectrogram saved: {} ({}x{})",
        output.display(),
        full.width(),
        full.height()
    );
    println!("Spectrogram written to {}", output.display());

    if let Some(preview_path) = preview {
        let image = engine.preview_image();
        image.save_png(&preview_path)?;
        println!("Preview window written to {}", preview_path.display());
    }

    Ok(())
}

/// Timestamped default output filename in the current directory.
fn default_output_path() -> PathBuf {
    PathBuf::from(
        chrono::Local::now()
            .format("melview-%Y%m%d-%H%M%S.png")
            .to_string(),
    )
}
