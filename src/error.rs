//! Error taxonomy for the capture pipeline.
//!
//! `ConfigError` and `FormatError` are fatal. `FrameError` only costs the
//! frame it happened on. Everything that escapes the coordinator is wrapped
//! in a `PipelineError` that knows which stage failed.

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("slice table has {0} entries, expected 88")]
    KeyCount(usize),

    #[error("slice widths sum to {sum}px but the frame is {width}px wide")]
    WidthSum { sum: u64, width: usize },

    #[error("slice {0} has zero width")]
    ZeroWidth(usize),

    #[error("frame rate must be positive, got {0}")]
    FrameRate(f64),

    #[error("frame dimensions must be within 1..=16384, got {width}x{height}")]
    Dimensions { width: usize, height: usize },

    #[error("threshold must be within 0..=100 percent, got {0}")]
    Threshold(f64),

    #[error("failed to read slice layout {path:?}: {source}")]
    LayoutRead { path: PathBuf, source: io::Error },

    #[error("failed to parse slice layout {path:?}: {source}")]
    LayoutParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("frame is {width}x{height}, expected {expected_width}x{expected_height}")]
    Dimensions {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("frame of {width}x{height} pixels is too large")]
    Oversized { width: usize, height: usize },

    #[error("corrupt frame {origin}: {reason}")]
    Corrupt { origin: String, reason: String },

    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame reader stopped before the end of the stream")]
    ReaderLost,
}

impl FrameError {
    /// The stream itself is broken, not just this frame. Nothing after it
    /// can be trusted, so the run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::Io(_) | FrameError::ReaderLost)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("note label {label:?} is {len} characters, expected 2 or 3")]
    LabelLength { label: String, len: usize },

    #[error("unrecognized note label {0:?}")]
    Parse(String),
}

/// Pipeline stage, used to say where a fatal error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Acquisition,
    Composition,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Acquisition => "acquisition",
            Stage::Composition => "composition",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("{source}")]
    Io { stage: Stage, source: io::Error },

    #[error("at frame {frame}: {source}")]
    Acquisition { frame: u64, source: FrameError },
}

impl PipelineError {
    pub fn io(stage: Stage, source: io::Error) -> Self {
        PipelineError::Io { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Configuration,
            PipelineError::Format(_) => Stage::Composition,
            PipelineError::Io { stage, .. } => *stage,
            PipelineError::Acquisition { .. } => Stage::Acquisition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution() {
        let e: PipelineError = ConfigError::KeyCount(87).into();
        assert_eq!(e.stage(), Stage::Configuration);
        assert!(e.to_string().contains("87"));

        let e: PipelineError = FormatError::Parse("H9".into()).into();
        assert_eq!(e.stage(), Stage::Composition);

        let e = PipelineError::io(Stage::Output, io::Error::other("disk full"));
        assert_eq!(e.stage(), Stage::Output);
        assert_eq!(format!("{} failed: {}", e.stage(), e), "output failed: disk full");

        let e = PipelineError::Acquisition {
            frame: 7,
            source: FrameError::ReaderLost,
        };
        assert_eq!(e.stage(), Stage::Acquisition);
        assert!(e.to_string().starts_with("at frame 7:"));
    }

    #[test]
    fn test_fatal_frame_errors() {
        assert!(FrameError::ReaderLost.is_fatal());
        assert!(FrameError::Io(io::Error::other("pipe closed")).is_fatal());
        assert!(!FrameError::Truncated { expected: 4, actual: 2 }.is_fatal());
        assert!(!FrameError::Oversized { width: 1, height: 1 }.is_fatal());
        assert!(!FrameError::Corrupt {
            origin: "f.pgm".into(),
            reason: "bad header".into(),
        }
        .is_fatal());
    }
}
