//! Optional per-frame side effects (preview images, console echo).
//!
//! Analysis never depends on these; the coordinator just hands each analyzed
//! frame to every registered visualizer.

use crate::image_io;
use crate::slice_map::SliceMap;
use crate::types::*;
use log::{debug, info};
use std::fs;
use std::io;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

/// Everything a visualizer may look at for one frame.
pub struct FrameView<'a> {
    pub state: &'a TimestampedState,
    pub frame: &'a Frame,
    pub analysis: &'a FrameAnalysis,
    pub slices: &'a SliceMap,
}

pub trait Visualizer {
    fn observe(&mut self, view: &FrameView<'_>) -> io::Result<()>;
}

/// Default: draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVisualizer;

impl Visualizer for NoopVisualizer {
    fn observe(&mut self, _view: &FrameView<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// Fan-out: every visualizer sees every frame, in order. Stops at the first
/// failure.
impl Visualizer for Vec<Box<dyn Visualizer>> {
    fn observe(&mut self, view: &FrameView<'_>) -> io::Result<()> {
        for visualizer in self.iter_mut() {
            visualizer.observe(view)?;
        }
        Ok(())
    }
}

// ─── PNG previews ───────────────────────────────────────────────────────────

/// Height of the key strip appended under each preview.
const STRIP_HEIGHT: usize = 24;
const STRIP_ON: u8 = 255;
const STRIP_OFF: u8 = 40;
const STRIP_BOUNDARY: u8 = 128;

/// Writes every Nth frame as a PNG with a strip underneath showing slice
/// boundaries and which keys were read as pressed.
pub struct PngPreview {
    dir: PathBuf,
    every: u64,
    written: u64,
}

impl PngPreview {
    pub fn create(dir: &Path, every: NonZeroU64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        info!("Previews: every {} frames → {:?}", every, dir);
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.get(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Visualizer for PngPreview {
    fn observe(&mut self, view: &FrameView<'_>) -> io::Result<()> {
        let index = view.state.frame_index;
        if index % self.every != 0 {
            return Ok(());
        }
        let preview = render_preview(view.frame, view.slices, &view.analysis.activation);
        let path = self.dir.join(format!("frame_{:06}.png", index));
        image_io::to_gray_image(&preview)?
            .save(&path)
            .map_err(io::Error::other)?;
        self.written += 1;
        debug!("Preview written: {:?}", path);
        Ok(())
    }
}

/// The frame with a key strip appended below it.
pub fn render_preview(frame: &Frame, slices: &SliceMap, activation: &ActivationVector) -> Frame {
    let mut pixels = frame.pixels.clone();
    let mut strip = vec![STRIP_OFF; frame.width];
    for slice in slices.slices() {
        let end = slice.x_end().min(frame.width);
        if slice.x_start >= end {
            continue;
        }
        if activation.is_active(slice.index) {
            strip[slice.x_start..end].fill(STRIP_ON);
        }
        strip[slice.x_start] = STRIP_BOUNDARY;
    }
    for _ in 0..STRIP_HEIGHT {
        pixels.extend_from_slice(&strip);
    }
    Frame {
        width: frame.width,
        height: frame.height + STRIP_HEIGHT,
        pixels,
    }
}
