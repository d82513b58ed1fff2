//! Partition of the frame width into one horizontal slice per key.
//!
//! The layout (a table of 88 pixel widths) is validated once at startup and
//! turned into an immutable `SliceMap` that the analyzer, composer and
//! simulator share through an `Arc`.

use crate::error::ConfigError;
use crate::pitch::{piano_keys, NoteName};
use crate::types::KEY_COUNT;
use log::info;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Relative width of a white-key slice in the proportional layout.
const WHITE_KEY_UNITS: u64 = 23;
/// Relative width of a black-key slice in the proportional layout.
const BLACK_KEY_UNITS: u64 = 20;

// ─── Layout table ───────────────────────────────────────────────────────────

/// Serializable slice-width table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceLayout {
    pub name: String,
    pub widths: Vec<u32>,
}

impl SliceLayout {
    /// Widths follow key proportions: white slices slightly wider than black
    /// ones, scaled to `frame_width` by cumulative rounding.
    pub fn piano_proportional(frame_width: usize) -> Self {
        let units: Vec<u64> = piano_keys()
            .iter()
            .map(|k| if k.is_black_key() { BLACK_KEY_UNITS } else { WHITE_KEY_UNITS })
            .collect();
        Self {
            name: "proportional".into(),
            widths: scale_units(&units, frame_width),
        }
    }

    /// Every key gets `frame_width / 88` pixels, remainders spread evenly.
    pub fn uniform(frame_width: usize) -> Self {
        Self {
            name: "uniform".into(),
            widths: scale_units(&[1; KEY_COUNT], frame_width),
        }
    }

    /// Load a layout from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::LayoutRead {
            path: path.to_path_buf(),
            source,
        })?;
        let layout: SliceLayout =
            serde_json::from_str(&data).map_err(|source| ConfigError::LayoutParse {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Loaded slice layout {:?} from {:?}", layout.name, path);
        Ok(layout)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Slice layout saved to {:?}", path);
        Ok(())
    }

    /// Resolve a CLI layout argument: a built-in name or a JSON file path.
    pub fn resolve(arg: &str, frame_width: usize) -> Result<Self, ConfigError> {
        match arg {
            "proportional" => Ok(Self::piano_proportional(frame_width)),
            "uniform" => Ok(Self::uniform(frame_width)),
            path => Self::load(Path::new(path)),
        }
    }

    pub fn total_width(&self) -> u64 {
        self.widths.iter().map(|&w| u64::from(w)).sum()
    }
}

/// Turn relative units into integer widths that sum to exactly `total`.
/// Each boundary is rounded independently so error never accumulates.
fn scale_units(units: &[u64], total: usize) -> Vec<u32> {
    let unit_sum: u64 = units.iter().sum();
    if unit_sum == 0 {
        return vec![0; units.len()];
    }
    let unit_sum = u128::from(unit_sum);
    let total = total as u128;
    let mut widths = Vec::with_capacity(units.len());
    let mut cumulative = 0u128;
    let mut prev_edge = 0u128;
    for &u in units {
        cumulative += u128::from(u);
        let edge = (2 * cumulative * total + unit_sum) / (2 * unit_sum);
        // a slice too wide for u32 fails the width-sum check later
        widths.push(u32::try_from(edge - prev_edge).unwrap_or(u32::MAX));
        prev_edge = edge;
    }
    widths
}

// ─── Slice map ──────────────────────────────────────────────────────────────

/// One key's horizontal pixel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub x_start: usize,
    pub width: usize,
    pub note: NoteName,
}

impl Slice {
    pub fn x_end(&self) -> usize {
        self.x_start + self.width
    }
}

#[derive(Debug, Clone)]
pub struct SliceMap {
    frame_width: usize,
    layout_name: String,
    slices: Vec<Slice>,
}

impl SliceMap {
    /// Validate `layout` against `frame_width` and lay the slices out
    /// left to right. The last slice is clamped to the frame edge.
    pub fn new(frame_width: usize, layout: &SliceLayout) -> Result<Self, ConfigError> {
        if layout.widths.len() != KEY_COUNT {
            return Err(ConfigError::KeyCount(layout.widths.len()));
        }
        let sum = layout.total_width();
        if sum != frame_width as u64 {
            return Err(ConfigError::WidthSum {
                sum,
                width: frame_width,
            });
        }
        if let Some(i) = layout.widths.iter().position(|&w| w == 0) {
            return Err(ConfigError::ZeroWidth(i));
        }

        let mut slices = Vec::with_capacity(KEY_COUNT);
        let mut x = 0usize;
        for (index, (&w, note)) in layout.widths.iter().zip(piano_keys()).enumerate() {
            let x_start = x.min(frame_width);
            let x_end = (x + w as usize).min(frame_width);
            slices.push(Slice {
                index,
                x_start,
                width: x_end - x_start,
                note,
            });
            x += w as usize;
        }

        Ok(Self {
            frame_width,
            layout_name: layout.name.clone(),
            slices,
        })
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn frame_width(&self) -> usize {
        self.frame_width
    }

    pub fn layout_name(&self) -> &str {
        &self.layout_name
    }

    pub fn note(&self, index: usize) -> Option<NoteName> {
        self.slices.get(index).map(|s| s.note)
    }

    /// Slice holding `note`, if it is on the keyboard.
    pub fn index_of(&self, note: &NoteName) -> Option<usize> {
        self.slices.iter().position(|s| s.note == *note)
    }

    /// Header labels in slice order: `A0`, `A#0`, ..., `C8`.
    pub fn labels(&self) -> Vec<String> {
        self.slices.iter().map(|s| s.note.to_string()).collect()
    }
}
