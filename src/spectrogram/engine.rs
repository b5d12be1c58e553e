//! Orchestration of the spectrogram pipeline.
//!
//! The engine owns every buffer in the per-frame path and runs
//! window/transform → mel remap → decibel normalization → history append in
//! a fixed order for each incoming frame. It tracks elapsed recording time
//! across start/stop segments and renders two image products: a preview of
//! the most recent window of frames and the full accumulated history.
//!
//! The engine itself is single-threaded; callers that feed frames from a
//! capture worker while issuing control or render calls from elsewhere wrap
//! it in a mutex so appends, clears, and renders serialize (see the record
//! command).

use std::time::{Duration, Instant};

use super::color::{self, PixelFormat, Raster};
use super::history::SpectralHistory;
use super::mel::MelFilterBank;
use super::transform::{normalize, WindowedTransform};
use super::{EngineConfig, SpectrogramError};

/// Called every `data_export_rate` frames with the current frame count.
pub type ExportHook = Box<dyn FnMut(usize) + Send>;

/// Live spectrogram engine.
pub struct SpectrogramEngine {
    config: EngineConfig,
    transform: WindowedTransform,
    mel: MelFilterBank,
    history: SpectralHistory,
    /// Scratch for the frame currently being processed; rewritten in place
    /// by each pipeline stage, never aliased across frames.
    frequency_domain: Vec<f32>,
    /// Reused preview-sized buffers so the per-refresh render path does not
    /// reallocate.
    preview_field: Vec<f32>,
    preview_planar: [Vec<f32>; 3],
    preview_packed: Vec<f32>,
    cached_preview: Raster,
    cached_full: Raster,
    /// Sum of completed segment durations.
    accumulated: Duration,
    /// Start of the running segment, if any.
    segment_start: Option<Instant>,
    frames_since_export: usize,
    export_hook: Option<ExportHook>,
    capture_ready: bool,
    revision: u64,
}

impl SpectrogramEngine {
    /// Builds an engine, its analysis window, filter bank, and scratch
    /// buffers.
    ///
    /// # Errors
    /// - `Configuration` if the config fails validation
    pub fn new(config: EngineConfig) -> Result<Self, SpectrogramError> {
        config.validate()?;

        let n = config.sample_count;
        let preview_len = n * config.buffer_count;
        let engine = Self {
            transform: WindowedTransform::new(n),
            mel: MelFilterBank::new(
                config.filter_bank_count,
                n,
                config.sample_rate,
                config.freq_lo,
                config.freq_hi,
            ),
            history: SpectralHistory::new(n),
            frequency_domain: vec![0.0; n],
            preview_field: vec![0.0; preview_len],
            preview_planar: [
                vec![0.0; preview_len],
                vec![0.0; preview_len],
                vec![0.0; preview_len],
            ],
            preview_packed: vec![0.0; preview_len * 3],
            cached_preview: Raster::empty(),
            cached_full: Raster::empty(),
            accumulated: Duration::ZERO,
            segment_start: None,
            frames_since_export: 0,
            export_hook: None,
            capture_ready: false,
            revision: 0,
            config,
        };

        tracing::info!(
            "spectrogram engine: freq range = {}..{} Hz, sample count = {}, \
             buffer count = {}, gain = {}, zero ref = {}, export rate = {}",
            engine.config.freq_lo,
            engine.config.freq_hi,
            engine.config.sample_count,
            engine.config.buffer_count,
            engine.config.gain,
            engine.config.zero_reference,
            engine.config.data_export_rate,
        );

        Ok(engine)
    }

    /// Installs the export extension point. No-op by default.
    pub fn set_export_hook(&mut self, hook: ExportHook) {
        self.export_hook = Some(hook);
    }

    /// Signals whether the capture collaborator is authorized and ready.
    /// Gates `set_running`, not frame processing.
    pub fn set_capture_ready(&mut self, ready: bool) {
        self.capture_ready = ready;
    }

    /// Processes one frame of raw audio.
    ///
    /// Frames are processed regardless of run state; run state only gates
    /// duration accounting. The frame length must equal the configured
    /// sample count.
    pub fn on_frame(&mut self, samples: &[i16]) {
        self.transform.transform(samples, &mut self.frequency_domain);
        self.mel.remap(&mut self.frequency_domain);
        normalize(
            &mut self.frequency_domain,
            self.config.zero_reference,
            self.config.gain,
        );

        let had_frames = self.history.frame_count() > 0;
        self.history.append(&self.frequency_domain);

        if had_frames {
            self.frames_since_export += 1;
            if self.frames_since_export >= self.config.data_export_rate {
                self.frames_since_export = 0;
                tracing::info!("exporting data ...");
                let frames = self.history.frame_count();
                if let Some(hook) = self.export_hook.as_mut() {
                    hook(frames);
                }
            }
        }

        self.revision += 1;
    }

    /// Renders the most recent window of frames.
    ///
    /// The image is always `sample_count × buffer_count`; while the history
    /// is shorter than the window, the leading rows are held at the
    /// magnitude floor. Returns the empty sentinel until the first frame
    /// arrives.
    pub fn preview_image(&mut self) -> Raster {
        let frames = self.history.frame_count();
        if frames == 0 {
            self.cached_preview = Raster::empty();
            return self.cached_preview.clone();
        }

        let n = self.history.sample_count();
        let rows = self.config.buffer_count;
        let visible = frames.min(rows);
        let padding = (rows - visible) * n;

        self.preview_field[..padding].fill(0.0);
        // The window request never exceeds the history here, so the only
        // failure mode is a programmer error.
        let window = self
            .history
            .window(frames - visible, visible)
            .expect("preview window within history");
        self.preview_field[padding..].copy_from_slice(window);

        color::shared_table().apply(&self.preview_field, &mut self.preview_planar);
        color::interleave(&self.preview_planar, &mut self.preview_packed);

        let raster = Raster::from_packed(&self.preview_packed, n, rows, PixelFormat::RgbF32);
        self.cached_preview = raster.clone();
        raster
    }

    /// Renders the entire accumulated history.
    ///
    /// Returns the empty sentinel immediately, without touching buffers,
    /// while the accumulated recording duration is zero.
    pub fn full_image(&mut self) -> Raster {
        if self.current_duration().is_zero() {
            return Raster::empty();
        }
        let frames = self.history.frame_count();
        if frames == 0 {
            return Raster::empty();
        }

        let started = Instant::now();
        let n = self.history.sample_count();
        let field = self
            .history
            .window(0, frames)
            .expect("full window within history");

        let len = field.len();
        let mut planar = [vec![0.0; len], vec![0.0; len], vec![0.0; len]];
        let mut packed = vec![0.0; len * 3];
        color::shared_table().apply(field, &mut planar);
        color::interleave(&planar, &mut packed);

        let raster = Raster::from_packed(&packed, n, frames, PixelFormat::RgbF32);
        tracing::info!(
            "full image: {} frames rendered in {:?}",
            frames,
            started.elapsed()
        );
        self.cached_full = raster.clone();
        raster
    }

    /// Most recently rendered full image, or the empty sentinel.
    pub fn cached_full(&self) -> Raster {
        self.cached_full.clone()
    }

    /// Resets the history, duration accounting, and cached images.
    pub fn clear(&mut self) {
        self.history.clear();
        self.accumulated = Duration::ZERO;
        self.segment_start = self.segment_start.map(|_| Instant::now());
        self.frames_since_export = 0;
        self.cached_preview = Raster::empty();
        self.cached_full = Raster::empty();
        self.revision += 1;
        tracing::info!("cleared");
    }

    /// Starts or stops the recording segment.
    ///
    /// When no capture device is ready the request is a no-op: it is logged
    /// as a warning and engine state is unchanged. Stopping folds the
    /// running segment into the accumulated duration before refreshing the
    /// full image, so the refresh observes the final duration.
    ///
    /// Returns whether the run state changed.
    pub fn set_running(&mut self, run: bool) -> bool {
        if !self.capture_ready {
            tracing::warn!("ignoring run={run}: {}", SpectrogramError::CaptureUnavailable);
            return false;
        }

        match (run, self.segment_start) {
            (true, None) => {
                self.segment_start = Some(Instant::now());
                tracing::info!("started");
            }
            (false, Some(start)) => {
                self.accumulated += start.elapsed();
                self.segment_start = None;
                self.full_image();
                tracing::info!("stopped at {:?}", self.accumulated);
            }
            _ => return false,
        }
        self.revision += 1;
        true
    }

    /// Whether a recording segment is running.
    pub fn is_running(&self) -> bool {
        self.segment_start.is_some()
    }

    /// Accumulated duration plus, while running, the elapsed time of the
    /// current segment.
    pub fn current_duration(&self) -> Duration {
        match self.segment_start {
            Some(start) => self.accumulated + start.elapsed(),
            None => self.accumulated,
        }
    }

    /// Number of frames appended so far.
    pub fn frame_count(&self) -> usize {
        self.history.frame_count()
    }

    /// Monotonically increasing change counter; bumped on every frame,
    /// clear, and run-state transition. Collaborators poll it to learn when
    /// images or duration changed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn small_config() -> EngineConfig {
        EngineConfig {
            sample_count: 64,
            buffer_count: 8,
            filter_bank_count: 64,
            sample_rate: 8000,
            freq_lo: 100.0,
            freq_hi: 3000.0,
            ..EngineConfig::default()
        }
    }

    fn engine() -> SpectrogramEngine {
        SpectrogramEngine::new(small_config()).unwrap()
    }

    #[test]
    fn construction_rejects_filter_bank_wider_than_frame() {
        let config = EngineConfig {
            filter_bank_count: 128,
            ..small_config()
        };
        assert!(matches!(
            SpectrogramEngine::new(config),
            Err(SpectrogramError::Configuration(_))
        ));
    }

    #[test]
    fn silent_frames_render_a_uniform_preview_band() {
        let mut engine = engine();
        let silence = vec![0i16; 64];
        for _ in 0..8 {
            engine.on_frame(&silence);
        }

        let preview = engine.preview_image();
        assert!(!preview.is_empty());
        assert_eq!((preview.width(), preview.height()), (64, 8));

        // All-floor input colorizes to one uniform color band.
        let bytes = preview.as_bytes();
        let first_pixel = &bytes[..12];
        for pixel in bytes.chunks_exact(12) {
            assert_eq!(pixel, first_pixel);
        }
    }

    #[test]
    fn preview_before_any_frame_is_the_sentinel() {
        let mut engine = engine();
        assert!(engine.preview_image().is_empty());
    }

    #[test]
    fn preview_pads_short_history_to_full_geometry() {
        let mut engine = engine();
        engine.on_frame(&vec![100i16; 64]);
        let preview = engine.preview_image();
        assert_eq!((preview.width(), preview.height()), (64, 8));
    }

    #[test]
    fn full_image_is_sentinel_while_duration_is_zero() {
        let mut engine = engine();
        engine.on_frame(&vec![100i16; 64]);
        assert!(engine.full_image().is_empty());
    }

    #[test]
    fn full_image_is_idempotent() {
        let mut engine = engine();
        engine.set_capture_ready(true);
        assert!(engine.set_running(true));
        sleep(Duration::from_millis(5));
        for i in 0..20 {
            let tone: Vec<i16> = (0..64).map(|s| ((s * i) % 500) as i16).collect();
            engine.on_frame(&tone);
        }
        assert!(engine.set_running(false));

        let first = engine.full_image();
        let second = engine.full_image();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.height(), 20);
    }

    #[test]
    fn stop_refreshes_the_cached_full_image() {
        let mut engine = engine();
        engine.set_capture_ready(true);
        engine.set_running(true);
        sleep(Duration::from_millis(5));
        engine.on_frame(&vec![50i16; 64]);
        assert!(engine.cached_full().is_empty());
        engine.set_running(false);
        assert!(!engine.cached_full().is_empty());
    }

    #[test]
    fn clear_resets_history_duration_and_caches() {
        let mut engine = engine();
        engine.set_capture_ready(true);
        engine.set_running(true);
        engine.on_frame(&vec![50i16; 64]);
        sleep(Duration::from_millis(5));
        engine.set_running(false);

        engine.clear();
        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.current_duration(), Duration::ZERO);
        assert!(engine.preview_image().is_empty());
        assert!(engine.cached_full().is_empty());
    }

    #[test]
    fn duration_accumulates_across_segments() {
        let mut engine = engine();
        engine.set_capture_ready(true);

        engine.set_running(true);
        sleep(Duration::from_millis(30));
        engine.set_running(false);
        let first = engine.current_duration();
        assert!(first >= Duration::from_millis(30));
        assert!(first < Duration::from_millis(300));

        engine.set_running(true);
        sleep(Duration::from_millis(20));
        engine.set_running(false);
        let total = engine.current_duration();
        assert!(total >= first + Duration::from_millis(20));
        assert!(total < first + Duration::from_millis(300));
    }

    #[test]
    fn start_without_capture_ready_is_a_no_op() {
        let mut engine = engine();
        assert!(!engine.set_running(true));
        assert!(!engine.is_running());
        assert_eq!(engine.current_duration(), Duration::ZERO);
    }

    #[test]
    fn export_hook_fires_at_the_configured_rate() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let config = EngineConfig {
            data_export_rate: 3,
            ..small_config()
        };
        let mut engine = SpectrogramEngine::new(config).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        engine.set_export_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let silence = vec![0i16; 64];
        // First frame does not count toward the export counter.
        for _ in 0..10 {
            engine.on_frame(&silence);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn revision_advances_on_frames_and_transitions() {
        let mut engine = engine();
        let initial = engine.revision();
        engine.on_frame(&vec![0i16; 64]);
        assert!(engine.revision() > initial);

        engine.set_capture_ready(true);
        engine.set_running(true);
        let running = engine.revision();
        engine.clear();
        assert!(engine.revision() > running);
    }
}
