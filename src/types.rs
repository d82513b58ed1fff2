use crate::error::{ConfigError, FrameError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Keys on a full-size piano, A0 through C8.
pub const KEY_COUNT: usize = 88;

/// A slice is "pressed" when its mean brightness is strictly above this
/// percentage of full white.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 70.0;

/// Frame rate the upstream transcoder normalizes every video to.
pub const DEFAULT_FPS: f64 = 24.0;

pub const DEFAULT_WIDTH: usize = 1920;
pub const DEFAULT_HEIGHT: usize = 1080;

/// Largest accepted frame width or height, in pixels.
pub const MAX_DIMENSION: usize = 16_384;

/// Frame size accepted by the pipeline: non-zero and at most `MAX_DIMENSION`
/// on each side.
pub fn check_dimensions(width: usize, height: usize) -> Result<(), ConfigError> {
    let in_range = |d: usize| (1..=MAX_DIMENSION).contains(&d);
    if in_range(width) && in_range(height) {
        Ok(())
    } else {
        Err(ConfigError::Dimensions { width, height })
    }
}

// ─── Raster frames ──────────────────────────────────────────────────────────

/// One 8-bit grayscale raster frame, row-major, `width * height` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer, rejecting buffers that don't match the dimensions.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width
            .checked_mul(height)
            .ok_or(FrameError::Oversized { width, height })?;
        if pixels.len() != expected {
            return Err(FrameError::Truncated {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A frame where every pixel has the same intensity. Meant for sizes that
    /// already passed `check_dimensions`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// Pixel row `y`. Empty if `y` is out of range.
    pub fn row(&self, y: usize) -> &[u8] {
        if y >= self.height {
            return &[];
        }
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        if y >= self.height {
            return &mut [];
        }
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }
}

// ─── Per-frame key state ────────────────────────────────────────────────────

/// Pressed/not-pressed state of all 88 keys for one frame, in slice order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationVector([bool; KEY_COUNT]);

impl ActivationVector {
    pub fn new(keys: [bool; KEY_COUNT]) -> Self {
        Self(keys)
    }

    pub fn silent() -> Self {
        Self([false; KEY_COUNT])
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Indices of active keys, ascending.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(|(i, _)| i)
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|&&on| on).count()
    }
}

impl fmt::Display for ActivationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, &on) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(if on { "1" } else { "0" })?;
        }
        f.write_str("]")
    }
}

/// Result of analyzing one frame: brightness per slice plus the binarized keys.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// Mean brightness of each slice as a percentage of full white (0–100).
    pub brightness: [f64; KEY_COUNT],
    pub activation: ActivationVector,
}

/// Key state stamped with its position in the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedState {
    pub frame_index: u64,
    pub timestamp: Duration,
    pub vector: ActivationVector,
}

// ─── Log value mode ─────────────────────────────────────────────────────────

/// What the raw and tabular logs record per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// 0/1 activation
    #[default]
    Binary,
    /// Brightness percentage, two decimals
    Percent,
}

// ─── Stream clock ───────────────────────────────────────────────────────────

/// Maps frame indices to elapsed stream time at a fixed frame rate.
///
/// Timestamps derive from the index alone, so skipped frames still occupy
/// their slot and frame `i` always lands at `i / fps`.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Elapsed time at `frame_index`, rounded to the microsecond.
    pub fn timestamp(&self, frame_index: u64) -> Duration {
        let micros = (frame_index as f64 * 1_000_000.0 / self.fps).round() as u64;
        Duration::from_micros(micros)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// `HH:MM:SS.ffffff`, built from integer hour/minute decomposition.
pub fn format_timestamp(elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    let hours = micros / 3_600_000_000;
    let minutes = (micros / 60_000_000) % 60;
    let seconds = (micros / 1_000_000) % 60;
    let fraction = micros % 1_000_000;
    format!("{:02}:{:02}:{:02}.{:06}", hours, minutes, seconds, fraction)
}
