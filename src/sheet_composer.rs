//! ASCII sheet music from the per-frame active-note sets.
//!
//! Each frame becomes a column of note labels, highest pitch first. Once the
//! stream ends, row `r` is read across all columns; a note equal to the one
//! last printed in that row collapses to the repeat marker, and a column with
//! nothing at rank `r` prints the rest marker and breaks the run.
//!
//! Rows are positional: row `r` holds whatever note was `r`-th highest in each
//! frame, so a voice can hop rows when the chord size changes.

use crate::error::FormatError;
use crate::pitch::{sort_descending, NoteName};
use crate::slice_map::SliceMap;
use crate::types::ActivationVector;
use log::debug;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Printed when a row's note is the same as its previous one.
pub const REPEAT_MARKER: &str = "---";
/// Printed when a row has no note in a frame.
pub const REST_MARKER: &str = " . ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Note(String),
    Rest,
}

/// Buffers one column per frame. `finish` consumes the composer, so the
/// sheet is rendered exactly once.
pub struct SheetComposer {
    slices: Arc<SliceMap>,
    columns: Vec<Vec<Entry>>,
}

impl SheetComposer {
    pub fn new(slices: Arc<SliceMap>) -> Self {
        Self {
            slices,
            columns: Vec::new(),
        }
    }

    /// Add one frame's column.
    pub fn push(&mut self, vector: &ActivationVector) -> Result<(), FormatError> {
        let mut notes: Vec<NoteName> = vector
            .active_indices()
            .filter_map(|i| self.slices.note(i))
            .collect();
        sort_descending(&mut notes);

        let column = if notes.is_empty() {
            vec![Entry::Rest]
        } else {
            notes
                .iter()
                .map(|n| n.format_fixed_width().map(Entry::Note))
                .collect::<Result<Vec<_>, _>>()?
        };
        self.columns.push(column);
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn finish(self) -> SheetMusic {
        let max_rows = self.columns.iter().map(Vec::len).max().unwrap_or(1);
        debug!(
            "Composing sheet: {} columns, {} rows",
            self.columns.len(),
            max_rows
        );

        let rows = (0..max_rows)
            .map(|r| {
                let mut previous: Option<&str> = None;
                self.columns
                    .iter()
                    .map(|column| match column.get(r) {
                        Some(Entry::Note(label)) if previous == Some(label.as_str()) => {
                            REPEAT_MARKER.to_string()
                        }
                        Some(Entry::Note(label)) => {
                            previous = Some(label.as_str());
                            label.clone()
                        }
                        Some(Entry::Rest) | None => {
                            previous = None;
                            REST_MARKER.to_string()
                        }
                    })
                    .collect()
            })
            .collect();

        SheetMusic { rows }
    }
}

/// Finished sheet: rows of 3-character tokens, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMusic {
    rows: Vec<Vec<String>>,
}

impl SheetMusic {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in &self.rows {
            writeln!(out, "{}", row.join(" "))?;
        }
        Ok(())
    }
}

impl fmt::Display for SheetMusic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
