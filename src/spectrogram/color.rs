//! False-color rendering of spectral magnitude fields.
//!
//! A quantized gray → RGB lookup table is built once per process and applied
//! with linear interpolation to turn a scalar field into three planar
//! channel fields; the compositor interleaves those into packed RGB data
//! and packages it as an image.
//!
//! The table sweeps hue from blue at gray 0 through red toward green at
//! gray 1 (the hue ramp's red/green channels are rotated relative to a
//! plain HSB sweep), with full saturation and square-root brightness
//! compression.

use std::path::Path;
use std::sync::OnceLock;

use image::{DynamicImage, GrayImage, Rgb32FImage};

use super::SpectrogramError;

/// Quantization levels of the shared lookup table.
pub const TABLE_LEVELS: usize = 32;

/// Gray → RGB lookup table at 16-bit precision per channel.
pub struct ColorTable {
    entries: Vec<[u16; 3]>,
}

/// Returns the process-wide lookup table, building it on first use.
pub fn shared_table() -> &'static ColorTable {
    static TABLE: OnceLock<ColorTable> = OnceLock::new();
    TABLE.get_or_init(|| ColorTable::build(TABLE_LEVELS))
}

impl ColorTable {
    /// Builds a table with `levels` quantized gray entries. Pure function of
    /// `levels`; no dependency on engine state.
    ///
    /// Interpolation needs both ends of the gray axis, so `levels` must be
    /// at least 2; anything less panics.
    pub fn build(levels: usize) -> Self {
        assert!(levels >= 2, "lookup table needs at least 2 levels");
        let entries = (0..levels)
            .map(|gray| {
                let normalized = gray as f32 / (levels - 1) as f32;
                let hue = 0.6666 * (1.0 - normalized);
                let brightness = normalized.sqrt();
                let (r, g, b) = hsb_to_rgb(hue, 1.0, brightness);
                // Rotate red/green so the ramp ends on green rather than red.
                [
                    (g * u16::MAX as f32) as u16,
                    (r * u16::MAX as f32) as u16,
                    (b * u16::MAX as f32) as u16,
                ]
            })
            .collect();
        Self { entries }
    }

    /// Applies the table to a scalar field, writing three planar channel
    /// fields in the range `0.0..=1.0`.
    ///
    /// Input values are clamped into `[0, 1]`, rescaled to the table's
    /// quantization axis, and looked up with linear interpolation between
    /// adjacent levels. Planar slices must match the field length.
    pub fn apply(&self, field: &[f32], planar: &mut [Vec<f32>; 3]) {
        for channel in planar.iter() {
            assert_eq!(channel.len(), field.len(), "planar length mismatch");
        }

        let top = self.entries.len() - 1;
        for (index, &value) in field.iter().enumerate() {
            let scaled = value.clamp(0.0, 1.0) * top as f32;
            let lo = scaled as usize;
            let hi = (lo + 1).min(top);
            let frac = scaled - lo as f32;

            for (channel, plane) in planar.iter_mut().enumerate() {
                let a = self.entries[lo][channel] as f32;
                let b = self.entries[hi][channel] as f32;
                plane[index] = (a + (b - a) * frac) / u16::MAX as f32;
            }
        }
    }
}

/// HSB to linear RGB, all components in `0.0..=1.0`.
fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> (f32, f32, f32) {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let sector = h as usize % 6;
    let f = h - h.floor();
    let p = brightness * (1.0 - saturation);
    let q = brightness * (1.0 - saturation * f);
    let t = brightness * (1.0 - saturation * (1.0 - f));
    match sector {
        0 => (brightness, t, p),
        1 => (q, brightness, p),
        2 => (p, brightness, t),
        3 => (p, q, brightness),
        4 => (t, p, brightness),
        _ => (brightness, p, q),
    }
}

/// Interleaves three planar channel fields into packed RGB data.
///
/// Pure rearrangement with no value transformation; `packed` must hold
/// exactly `3 ×` the planar length.
pub fn interleave(planar: &[Vec<f32>; 3], packed: &mut [f32]) {
    assert_eq!(packed.len(), planar[0].len() * 3, "packed length mismatch");
    for (index, chunk) in packed.chunks_exact_mut(3).enumerate() {
        chunk[0] = planar[0][index];
        chunk[1] = planar[1][index];
        chunk[2] = planar[2][index];
    }
}

/// Supported raster pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 × 8-bit integer channels.
    Rgb8,
    /// 3 × 16-bit integer channels.
    Rgb16,
    /// 3 × 32-bit float channels.
    RgbF32,
}

impl PixelFormat {
    /// Resolves a channel count / bit depth combination.
    ///
    /// # Errors
    /// - `FormatUnsupported` if the combination has no representation
    pub fn from_parts(channels: u8, bits: u8) -> Result<Self, SpectrogramError> {
        match (channels, bits) {
            (3, 8) => Ok(Self::Rgb8),
            (3, 16) => Ok(Self::Rgb16),
            (3, 32) => Ok(Self::RgbF32),
            _ => Err(SpectrogramError::FormatUnsupported { channels, bits }),
        }
    }
}

/// A displayable raster image, independently owned by the caller.
#[derive(Clone)]
pub struct Raster {
    image: DynamicImage,
}

impl Raster {
    /// The canonical 1×1 neutral placeholder used whenever no data exists.
    pub fn empty() -> Self {
        let image = GrayImage::from_raw(1, 1, vec![0]).expect("1x1 buffer");
        Self {
            image: DynamicImage::ImageLuma8(image),
        }
    }

    /// Whether this raster is the empty placeholder.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 1 && self.image.height() == 1
    }

    /// Packages packed RGB data as a raster in the requested format.
    ///
    /// `packed` holds `width × height` pixels of three `0.0..=1.0` channel
    /// values each; integer formats quantize. A length mismatch is a
    /// programmer error and panics.
    pub fn from_packed(
        packed: &[f32],
        width: usize,
        height: usize,
        format: PixelFormat,
    ) -> Self {
        assert_eq!(packed.len(), width * height * 3, "packed length mismatch");
        let (width, height) = (width as u32, height as u32);

        let image = match format {
            PixelFormat::RgbF32 => {
                let buffer = Rgb32FImage::from_raw(width, height, packed.to_vec())
                    .expect("raster buffer");
                DynamicImage::ImageRgb32F(buffer)
            }
            PixelFormat::Rgb16 => {
                let data: Vec<u16> = packed
                    .iter()
                    .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16)
                    .collect();
                let buffer = image::ImageBuffer::from_raw(width, height, data)
                    .expect("raster buffer");
                DynamicImage::ImageRgb16(buffer)
            }
            PixelFormat::Rgb8 => {
                let data: Vec<u8> = packed
                    .iter()
                    .map(|&v| (v.clamp(0.0, 1.0) * u8::MAX as f32) as u8)
                    .collect();
                let buffer = image::ImageBuffer::from_raw(width, height, data)
                    .expect("raster buffer");
                DynamicImage::ImageRgb8(buffer)
            }
        };

        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw pixel bytes, for change detection and tests.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }

    /// Writes the raster as an 8-bit PNG.
    ///
    /// # Errors
    /// - If encoding or the filesystem write fails
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.to_rgb8().save(path)
    }
}
