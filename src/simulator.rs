use crate::error::FrameError;
use crate::frame_source::FrameSource;
use crate::pitch::{Letter, NoteName};
use crate::slice_map::SliceMap;
use crate::types::*;
use log::info;
use std::fmt;
use std::sync::Arc;

/// Top band intensity behind an unpressed key.
const BAND_IDLE: u8 = 16;
/// Top band intensity over a pressed key, well above the 70% threshold.
const BAND_LIT: u8 = 235;
const WHITE_KEY: u8 = 200;
const BLACK_KEY: u8 = 24;

/// One step of a scripted performance.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Hold these notes for `frames` frames.
    Chord { notes: Vec<NoteName>, frames: u32 },
    /// Nothing pressed.
    Silence { frames: u32 },
    /// Frames that arrive unreadable, as from a damaged file.
    Dropout { frames: u32 },
}

impl Gesture {
    fn frames(&self) -> u32 {
        match self {
            Gesture::Chord { frames, .. }
            | Gesture::Silence { frames }
            | Gesture::Dropout { frames } => *frames,
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Chord { notes, frames } => {
                let names: Vec<String> = notes.iter().map(|n| n.to_string()).collect();
                write!(f, "chord [{}] for {} frames", names.join(" "), frames)
            }
            Gesture::Silence { frames } => write!(f, "silence for {} frames", frames),
            Gesture::Dropout { frames } => write!(f, "dropout for {} frames", frames),
        }
    }
}

/// Renders a keyboard-visualizer video from a gesture script: a keyboard
/// picture with a light band along the top edge above every pressed key.
pub struct Simulator {
    slices: Arc<SliceMap>,
    height: usize,
    gestures: Vec<Gesture>,
    gesture: usize,
    step: u32,
    emitted: u64,
}

impl Simulator {
    pub fn new(slices: Arc<SliceMap>, height: usize, gestures: Vec<Gesture>) -> Self {
        Self {
            slices,
            height,
            gestures,
            gesture: 0,
            step: 0,
            emitted: 0,
        }
    }

    /// The built-in demo: a scale, some chords, one dropped frame.
    pub fn demo(slices: Arc<SliceMap>, height: usize) -> Self {
        Self::new(slices, height, demo_sequence())
    }

    pub fn total_frames(&self) -> u64 {
        self.gestures.iter().map(|g| u64::from(g.frames())).sum()
    }

    /// Draw one frame with `notes` pressed.
    pub fn render(&self, notes: &[NoteName]) -> Frame {
        let width = self.slices.frame_width();
        let band = (self.height / 8).max(1);
        let mut frame = Frame::filled(width, self.height, BAND_IDLE);

        for slice in self.slices.slices() {
            let range = slice.x_start..slice.x_end();
            let key = if slice.note.is_black_key() { BLACK_KEY } else { WHITE_KEY };
            for y in band..self.height {
                frame.row_mut(y)[range.clone()].fill(key);
            }
        }
        for note in notes {
            if let Some(slice) = self.slices.index_of(note).map(|i| self.slices.slices()[i]) {
                for y in 0..band {
                    frame.row_mut(y)[slice.x_start..slice.x_end()].fill(BAND_LIT);
                }
            }
        }
        frame
    }
}

impl FrameSource for Simulator {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        loop {
            let gesture = self.gestures.get(self.gesture)?;
            if self.step >= gesture.frames() {
                self.gesture += 1;
                self.step = 0;
                continue;
            }
            if self.step == 0 {
                info!("  {}", gesture);
            }
            self.step += 1;
            let index = self.emitted;
            self.emitted += 1;

            return Some(match gesture {
                Gesture::Chord { notes, .. } => Ok(self.render(notes)),
                Gesture::Silence { .. } => Ok(self.render(&[])),
                Gesture::Dropout { .. } => Err(FrameError::Corrupt {
                    origin: format!("simulated frame {}", index),
                    reason: "dropout".into(),
                }),
            });
        }
    }
}

fn n(letter: Letter, octave: i32) -> NoteName {
    NoteName::new(letter, false, octave)
}

fn sharp(letter: Letter, octave: i32) -> NoteName {
    NoteName::new(letter, true, octave)
}

/// About eight seconds at 24 fps.
pub fn demo_sequence() -> Vec<Gesture> {
    use Letter::*;

    let scale = [n(C, 4), n(D, 4), n(E, 4), n(F, 4), n(G, 4), n(A, 4), n(B, 4), n(C, 5)];
    let mut gestures = vec![Gesture::Silence { frames: 12 }];
    for note in scale {
        gestures.push(Gesture::Chord {
            notes: vec![note],
            frames: 6,
        });
    }
    gestures.extend([
        Gesture::Silence { frames: 6 },
        Gesture::Chord {
            notes: vec![n(C, 3), n(E, 4), n(G, 4), n(C, 5)],
            frames: 24,
        },
        Gesture::Dropout { frames: 1 },
        Gesture::Chord {
            notes: vec![n(F, 3), n(A, 4), n(C, 5)],
            frames: 18,
        },
        Gesture::Chord {
            notes: vec![n(G, 2), sharp(F, 4), n(B, 4), n(D, 5)],
            frames: 18,
        },
        Gesture::Chord {
            notes: vec![n(C, 3), n(G, 3), n(E, 4), n(C, 5)],
            frames: 36,
        },
        Gesture::Chord {
            notes: vec![n(A, 0), n(C, 8)],
            frames: 6,
        },
        Gesture::Silence { frames: 12 },
    ]);
    gestures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_analyzer::FrameAnalyzer;
    use crate::slice_map::SliceLayout;

    fn slices() -> Arc<SliceMap> {
        Arc::new(SliceMap::new(1280, &SliceLayout::piano_proportional(1280)).unwrap())
    }

    #[test]
    fn test_rendered_chord_is_detected() {
        let slices = slices();
        let sim = Simulator::new(slices.clone(), 72, Vec::new());
        let chord = [n(Letter::C, 4), sharp(Letter::F, 4), n(Letter::A, 0)];
        let frame = sim.render(&chord);

        let analyzer = FrameAnalyzer::new(slices.clone(), 72).unwrap();
        let active: Vec<String> = analyzer
            .analyze(&frame)
            .unwrap()
            .activation
            .active_indices()
            .filter_map(|i| slices.note(i))
            .map(|n| n.to_string())
            .collect();
        assert_eq!(active, ["A0", "C4", "F#4"]);
    }

    #[test]
    fn test_script_playback() {
        let gestures = vec![
            Gesture::Chord {
                notes: vec![n(Letter::E, 2)],
                frames: 2,
            },
            Gesture::Silence { frames: 0 },
            Gesture::Dropout { frames: 1 },
            Gesture::Silence { frames: 1 },
        ];
        let mut sim = Simulator::new(slices(), 16, gestures);
        assert_eq!(sim.total_frames(), 4);

        assert!(sim.next_frame().unwrap().is_ok());
        assert!(sim.next_frame().unwrap().is_ok());
        match sim.next_frame() {
            Some(Err(FrameError::Corrupt { origin, .. })) => assert_eq!(origin, "simulated frame 2"),
            other => panic!("expected dropout, got {:?}", other),
        }
        let silent = sim.next_frame().unwrap().unwrap();
        assert!(silent.row(0).iter().all(|&p| p == BAND_IDLE));
        assert!(sim.next_frame().is_none());
    }

    #[test]
    fn test_demo_sequence_in_range() {
        let slices = slices();
        for g in demo_sequence() {
            if let Gesture::Chord { notes, .. } = g {
                for note in notes {
                    assert!(slices.index_of(&note).is_some(), "{} off keyboard", note);
                }
            }
        }
    }
}
