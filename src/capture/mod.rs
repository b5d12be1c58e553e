//! Audio capture for melview.
//!
//! Captures PCM audio from a system input device via cpal, mixes the
//! device's channels down to mono i16, slices the stream into fixed-length
//! overlapping frames, and delivers complete frames on an mpsc channel. The
//! spectrogram core never sees partial frames; reassembly happens here.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::Sender;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Slices a continuous mono sample stream into overlapping frames.
///
/// Emits a frame of `sample_count` samples each time one is complete, then
/// advances by `hop` samples so successive frames overlap by
/// `sample_count - hop`.
pub struct FrameBatcher {
    sample_count: usize,
    hop: usize,
    pending: Vec<i16>,
}

impl FrameBatcher {
    pub fn new(sample_count: usize, hop: usize) -> Self {
        Self {
            sample_count,
            hop,
            pending: Vec::with_capacity(sample_count * 2),
        }
    }

    /// Buffers `samples` and invokes `emit` for every complete frame.
    pub fn push(&mut self, samples: &[i16], mut emit: impl FnMut(&[i16])) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.sample_count {
            emit(&self.pending[..self.sample_count]);
            self.pending.drain(..self.hop);
        }
    }
}

/// Captures audio from a specified or default input device.
///
/// Opening the device resolves its native sample rate and channel count;
/// the actual rate may differ from the requested one, so callers configure
/// their analysis from [`AudioCapture::sample_rate`] after opening. A
/// successfully opened device doubles as the capture-ready signal for the
/// engine.
pub struct AudioCapture {
    device: cpal::Device,
    sample_rate: u32,
    device_channels: usize,
    sample_format: cpal::SampleFormat,
    stream_config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
}

impl AudioCapture {
    /// Opens an input device without starting a stream.
    ///
    /// # Arguments
    /// * `device_name` - "default", a device name, or a numeric index from
    ///   `melview list-devices`
    /// * `requested_sample_rate` - Desired rate in Hz; the device's native
    ///   rate wins
    ///
    /// # Errors
    /// - If no matching device is available
    /// - If the device configuration cannot be queried
    pub fn open(device_name: &str, requested_sample_rate: u32) -> Result<Self> {
        // Resolve the device while suppressing ALSA library warnings
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, device_name)
            }
        })?;

        let name = device.name().unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Capture device: {}", name);

        let device_config = device.default_input_config()?;
        let sample_rate = device_config.sample_rate().0;
        let device_channels = device_config.channels() as usize;
        let sample_format = device_config.sample_format();

        if sample_rate != requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Capturing at device rate.",
                requested_sample_rate,
                sample_rate
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            device_channels,
            sample_format
        );

        Ok(Self {
            device,
            sample_rate,
            device_channels,
            sample_format,
            stream_config: device_config.into(),
            stream: None,
        })
    }

    /// The device's actual sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Starts the input stream, sending complete frames of `sample_count`
    /// samples (overlapping by `sample_count - hop`) to `frames`.
    ///
    /// Dropping the capture (or calling [`AudioCapture::stop`]) ends the
    /// stream; the receiving side observes the channel closing.
    ///
    /// # Errors
    /// - If the stream cannot be built or started
    /// - If the device's sample format is unsupported
    pub fn start(&mut self, sample_count: usize, hop: usize, frames: Sender<Vec<i16>>) -> Result<()> {
        let channels = self.device_channels;
        let mut batcher = FrameBatcher::new(sample_count, hop);
        let mut deliver = move |data: &[i16]| {
            let mono = mix_to_mono(data, channels);
            batcher.push(&mono, |frame| {
                // The receiver hanging up just means recording stopped.
                let _ = frames.send(frame.to_vec());
            });
        };

        let err_fn = |err| {
            tracing::error!("Audio stream error: {}", err);
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| deliver(data),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let widened: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    deliver(&widened);
                },
                err_fn,
                None,
            )?,
            format => {
                return Err(anyhow!("Unsupported device sample format: {format:?}"));
            }
        };

        stream.play()?;
        self.stream = Some(stream);
        tracing::debug!("Audio stream started");
        Ok(())
    }

    /// Stops the input stream and drops the frame sender.
    pub fn stop(&mut self) {
        self.stream = None;
        tracing::debug!("Audio stream stopped");
    }
}

/// Mixes interleaved multi-channel samples down to mono by averaging.
fn mix_to_mono(data: &[i16], num_channels: usize) -> Vec<i16> {
    match num_channels {
        1 => data.to_vec(),
        2 => data
            .chunks_exact(2)
            .map(|chunk| {
                let left = chunk[0] as i32;
                let right = chunk[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect(),
        _ => data
            .chunks_exact(num_channels)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / num_channels as i32) as i16
            })
            .collect(),
    }
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.into_iter().nth(index).unwrap());
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            devices.len().saturating_sub(1)
        ));
    }

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'melview list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batcher_emits_overlapping_frames() {
        let mut batcher = FrameBatcher::new(4, 2);
        let mut frames: Vec<Vec<i16>> = Vec::new();
        batcher.push(&[0, 1, 2, 3, 4, 5], |frame| frames.push(frame.to_vec()));

        assert_eq!(frames, vec![vec![0, 1, 2, 3], vec![2, 3, 4, 5]]);
    }

    #[test]
    fn batcher_holds_partial_frames() {
        let mut batcher = FrameBatcher::new(4, 2);
        let mut frames = 0;
        batcher.push(&[0, 1, 2], |_| frames += 1);
        assert_eq!(frames, 0);
        batcher.push(&[3], |_| frames += 1);
        assert_eq!(frames, 1);
    }

    #[test]
    fn mono_mixdown_averages_channel_pairs() {
        assert_eq!(mix_to_mono(&[10, 20, 30, 50], 2), vec![15, 40]);
        assert_eq!(mix_to_mono(&[7, 8, 9], 1), vec![7, 8, 9]);
        assert_eq!(mix_to_mono(&[3, 6, 9, 30, 60, 90], 3), vec![6, 60]);
    }
}
