use crate::slice_map::SliceMap;
use crate::types::*;
use crate::visualizer::{FrameView, Visualizer};
use std::io::{self, Stdout, Write};

/// Echoes key state to the terminal as a one-line keyboard per frame.
pub struct ConsoleDisplay<W: Write> {
    out: W,
    every: u64,
}

impl ConsoleDisplay<Stdout> {
    pub fn stdout(every: u64) -> Self {
        Self::new(io::stdout(), every)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    /// Print every `every`-th frame (0 is treated as 1).
    pub fn new(out: W, every: u64) -> Self {
        Self {
            out,
            every: every.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Visualizer for ConsoleDisplay<W> {
    fn observe(&mut self, view: &FrameView<'_>) -> io::Result<()> {
        if view.state.frame_index % self.every != 0 {
            return Ok(());
        }
        writeln!(
            self.out,
            "{}  {}  {}",
            format_timestamp(view.state.timestamp),
            make_keyboard(&view.state.vector, view.slices),
            held_notes(&view.state.vector, view.slices),
        )?;
        self.out.flush()
    }
}

/// 88 cells: `█` pressed, `░` black key up, `·` white key up.
fn make_keyboard(vector: &ActivationVector, slices: &SliceMap) -> String {
    slices
        .slices()
        .iter()
        .map(|s| match (vector.is_active(s.index), s.note.is_black_key()) {
            (true, _) => '█',
            (false, true) => '░',
            (false, false) => '·',
        })
        .collect()
}

fn held_notes(vector: &ActivationVector, slices: &SliceMap) -> String {
    let names: Vec<String> = vector
        .active_indices()
        .filter_map(|i| slices.note(i))
        .map(|n| n.to_string())
        .collect();
    if names.is_empty() {
        "rest".to_string()
    } else {
        names.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice_map::SliceLayout;
    use std::time::Duration;

    #[test]
    fn test_console_line() {
        let slices = SliceMap::new(88, &SliceLayout::uniform(88)).unwrap();
        let frame = Frame::filled(88, 1, 0);
        let mut keys = [false; KEY_COUNT];
        keys[39] = true;
        keys[43] = true;
        let analysis = FrameAnalysis {
            brightness: [0.0; KEY_COUNT],
            activation: ActivationVector::new(keys),
        };

        let mut display = ConsoleDisplay::new(Vec::new(), 2);
        for i in 0..3 {
            let state = TimestampedState {
                frame_index: i,
                timestamp: Duration::from_millis(500 * i),
                vector: analysis.activation,
            };
            let view = FrameView {
                state: &state,
                frame: &frame,
                analysis: &analysis,
                slices: &slices,
            };
            display.observe(&view).unwrap();
        }

        let text = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00:00:00.000000  ·░·"));
        assert!(lines[1].starts_with("00:00:01.000000"));
        assert!(lines[1].ends_with("C4 E4"));
        assert_eq!(lines[0].chars().filter(|&c| c == '█').count(), 2);
    }
}
