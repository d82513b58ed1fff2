use crate::data_logger::StateLog;
use crate::error::{ConfigError, PipelineError, Stage};
use crate::frame_analyzer::FrameAnalyzer;
use crate::frame_source::FrameSource;
use crate::pacing::{NoPacing, Pacer};
use crate::sheet_composer::{SheetComposer, SheetMusic};
use crate::types::*;
use crate::visualizer::{FrameView, NoopVisualizer, Visualizer};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::io::Write;

/// Progress is logged every this many frames.
const PROGRESS_INTERVAL: u64 = 1000;

/// Summary of one run, written as `stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    /// Frames the source produced, readable or not.
    pub total_frames: u64,
    pub logged_frames: u64,
    pub skipped_frames: u64,
    pub fps: f64,
    /// Stream length implied by `total_frames` at `fps`.
    pub duration_secs: f64,
    pub value_mode: ValueMode,
    pub layout: String,
    pub threshold_percent: f64,
    pub sheet_rows: usize,
}

pub struct RunReport {
    pub stats: RunStats,
    pub sheet: SheetMusic,
}

/// Pulls frames from a source one at a time and drives them through
/// analysis, logging, sheet buffering, visualization and pacing.
///
/// Strictly sequential: frame `i + 1` is not touched until every output for
/// frame `i` has been flushed. A frame that fails to decode or analyze is
/// skipped with a warning but keeps its timestamp slot. A broken stream
/// (read failure, lost reader thread) ends the run with an error.
pub struct Coordinator {
    analyzer: FrameAnalyzer,
    clock: FrameClock,
    pacer: Box<dyn Pacer>,
    visualizer: Box<dyn Visualizer>,
}

impl Coordinator {
    pub fn new(analyzer: FrameAnalyzer, fps: f64) -> Result<Self, ConfigError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(ConfigError::FrameRate(fps));
        }
        Ok(Self {
            analyzer,
            clock: FrameClock::new(fps),
            pacer: Box::new(NoPacing),
            visualizer: Box::new(NoopVisualizer),
        })
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Replace the default no-op visualizer. Pass a `Vec` of visualizers to
    /// drive several.
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn run<S, W>(&mut self, source: &mut S, log: &mut StateLog<W>) -> Result<RunReport, PipelineError>
    where
        S: FrameSource + ?Sized,
        W: Write,
    {
        let slices = self.analyzer.slices().clone();
        let mut composer = SheetComposer::new(slices.clone());
        let mut frame_index: u64 = 0;
        let mut skipped: u64 = 0;

        info!(
            "Coordinator running ({}x{} @ {} fps, threshold {:.1}%, layout {})",
            self.analyzer.width(),
            self.analyzer.height(),
            self.clock.fps(),
            self.analyzer.threshold(),
            slices.layout_name()
        );

        while let Some(next) = source.next_frame() {
            let timestamp = self.clock.timestamp(frame_index);
            let analyzed = next.and_then(|frame| {
                let analysis = self.analyzer.analyze(&frame)?;
                Ok((frame, analysis))
            });

            match analyzed {
                Ok((frame, analysis)) => {
                    let state = TimestampedState {
                        frame_index,
                        timestamp,
                        vector: analysis.activation,
                    };
                    log.append(timestamp, &analysis)
                        .map_err(|e| PipelineError::io(Stage::Output, e))?;
                    composer.push(&analysis.activation)?;

                    let view = FrameView {
                        state: &state,
                        frame: &frame,
                        analysis: &analysis,
                        slices: &slices,
                    };
                    self.visualizer
                        .observe(&view)
                        .map_err(|e| PipelineError::io(Stage::Output, e))?;
                    trace!("{} {}", format_timestamp(timestamp), analysis.activation);
                    self.pacer.pace();
                }
                Err(e) if e.is_fatal() => {
                    return Err(PipelineError::Acquisition {
                        frame: frame_index,
                        source: e,
                    });
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        "Skipping frame {} at {}: {}",
                        frame_index,
                        format_timestamp(timestamp),
                        e
                    );
                }
            }

            frame_index += 1;
            if frame_index % PROGRESS_INTERVAL == 0 {
                info!(
                    "Processed {} frames ({} skipped), at {}",
                    frame_index,
                    skipped,
                    format_timestamp(timestamp)
                );
            }
        }

        debug!("Stream ended after {} frames; composing sheet", frame_index);
        let sheet = composer.finish();

        let stats = RunStats {
            total_frames: frame_index,
            logged_frames: log.records(),
            skipped_frames: skipped,
            fps: self.clock.fps(),
            duration_secs: frame_index as f64 / self.clock.fps(),
            value_mode: log.mode(),
            layout: slices.layout_name().to_string(),
            threshold_percent: self.analyzer.threshold(),
            sheet_rows: sheet.rows().len(),
        };
        info!(
            "Coordinator finished: {} frames, {} logged, {} skipped",
            stats.total_frames, stats.logged_frames, stats.skipped_frames
        );
        Ok(RunReport { stats, sheet })
    }
}
