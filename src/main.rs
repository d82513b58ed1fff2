use keys_capture::console_display::ConsoleDisplay;
use keys_capture::coordinator::Coordinator;
use keys_capture::data_logger::{self, StateLog};
use keys_capture::error::{FrameError, PipelineError, Stage};
use keys_capture::frame_analyzer::FrameAnalyzer;
use keys_capture::frame_source::{self, FrameSource, PgmSequence, RawVideoReader};
use keys_capture::pacing::RealTimePacer;
use keys_capture::simulator::Simulator;
use keys_capture::slice_map::{SliceLayout, SliceMap};
use keys_capture::types::*;
use keys_capture::visualizer::{PngPreview, Visualizer};

use clap::Parser;
use log::{error, info, warn};
use std::fs::File;
use std::io::{self, BufReader};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Frames the reader thread may decode ahead of analysis.
const READ_AHEAD: usize = 32;

#[derive(Parser)]
#[command(name = "keys-capture")]
#[command(about = "Piano key state capture from keyboard-visualizer video frames")]
struct Cli {
    /// Raw 8-bit grayscale video (`-` for stdin), e.g. from
    /// `ffmpeg -i in.mp4 -vf scale=1920:1080,fps=24 -pix_fmt gray -f rawvideo -`
    #[arg(long, conflicts_with_all = ["frames_dir", "simulate"])]
    input: Option<String>,

    /// Directory of binary PGM frames, processed in file-name order
    #[arg(long, conflicts_with = "simulate")]
    frames_dir: Option<PathBuf>,

    /// Render frames from the built-in demo performance instead of reading video
    #[arg(long)]
    simulate: bool,

    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: usize,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,

    /// Fixed frame rate of the input (frames per second)
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: f64,

    /// Brightness percentage a key must exceed to count as pressed
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_PERCENT)]
    threshold: f64,

    /// Values written to the raw and CSV logs
    #[arg(long, value_enum, default_value_t = ValueMode::Binary)]
    values: ValueMode,

    /// Slice widths: "proportional", "uniform", or a JSON layout file
    #[arg(long, default_value = "proportional")]
    layout: String,

    /// Directory for output.txt, output.csv, sheet.txt and stats.json
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Wait one frame interval after each frame, like live playback
    #[arg(long)]
    realtime: bool,

    /// Write PNG preview images with the detected keys marked
    #[arg(long)]
    preview: bool,

    /// Write a preview every N frames
    #[arg(long, default_value = "24")]
    preview_every: NonZeroU64,

    /// Echo each frame's key state to the terminal
    #[arg(long)]
    console: bool,

    /// Echo every Nth frame when --console is set
    #[arg(long, default_value_t = 1)]
    console_every: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} failed: {}", e.stage(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    check_dimensions(cli.width, cli.height)?;
    let layout = SliceLayout::resolve(&cli.layout, cli.width)?;
    let slices = Arc::new(SliceMap::new(cli.width, &layout)?);
    let analyzer = FrameAnalyzer::new(slices.clone(), cli.height)?.with_threshold(cli.threshold)?;

    info!("═══════════════════════════════════════════════");
    info!("  KEYS CAPTURE v{}", env!("CARGO_PKG_VERSION"));
    info!("  Frames: {}x{} @ {} fps", cli.width, cli.height, cli.fps);
    info!("  Layout: {}  Threshold: {:.1}%", slices.layout_name(), cli.threshold);
    info!("  Values: {:?}", cli.values);
    info!("  Output: {:?}", cli.output_dir);
    info!("═══════════════════════════════════════════════");

    let mut coordinator = Coordinator::new(analyzer, cli.fps)?;
    if cli.realtime {
        let interval = coordinator.clock().frame_interval();
        coordinator = coordinator.with_pacer(Box::new(RealTimePacer::new(interval)));
    }
    let mut visualizers: Vec<Box<dyn Visualizer>> = Vec::new();
    if cli.preview {
        let preview = PngPreview::create(&cli.output_dir.join("previews"), cli.preview_every)
            .map_err(|e| PipelineError::io(Stage::Output, e))?;
        visualizers.push(Box::new(preview));
    }
    if cli.console {
        visualizers.push(Box::new(ConsoleDisplay::stdout(cli.console_every)));
    }
    if !visualizers.is_empty() {
        coordinator = coordinator.with_visualizer(Box::new(visualizers));
    }

    let labels = slices.labels();
    let source = open_source(&cli, slices).map_err(|e| PipelineError::io(Stage::Acquisition, e))?;
    let mut log = StateLog::create(&cli.output_dir, &labels, cli.values)
        .map_err(|e| PipelineError::io(Stage::Output, e))?;
    let (mut frames, reader) = frame_source::spawn_reader(source, READ_AHEAD)
        .map_err(|e| PipelineError::io(Stage::Acquisition, e))?;

    let report = coordinator.run(&mut frames, &mut log)?;
    drop(frames);
    reader.join().map_err(|_| PipelineError::Acquisition {
        frame: report.stats.total_frames,
        source: FrameError::ReaderLost,
    })?;

    data_logger::write_sheet(&cli.output_dir, &report.sheet)
        .map_err(|e| PipelineError::io(Stage::Output, e))?;
    let stats_path = data_logger::write_stats(&cli.output_dir, &report.stats)
        .map_err(|e| PipelineError::io(Stage::Output, e))?;

    if report.stats.skipped_frames > 0 {
        warn!(
            "{} of {} frames were unreadable and skipped",
            report.stats.skipped_frames, report.stats.total_frames
        );
    }
    info!(
        "Done: {} frames logged, {} skipped, {:.2}s of video → {:?}",
        report.stats.logged_frames, report.stats.skipped_frames, report.stats.duration_secs, stats_path
    );
    Ok(())
}

fn open_source(cli: &Cli, slices: Arc<SliceMap>) -> io::Result<Box<dyn FrameSource + Send>> {
    if cli.simulate {
        info!("Starting simulator...");
        let sim = Simulator::demo(slices, cli.height);
        info!("Demo sequence: {} frames", sim.total_frames());
        return Ok(Box::new(sim));
    }
    if let Some(dir) = &cli.frames_dir {
        return Ok(Box::new(PgmSequence::open(dir)?));
    }
    match cli.input.as_deref() {
        None | Some("-") => {
            info!("Reading raw frames from stdin");
            Ok(Box::new(RawVideoReader::new(io::stdin(), cli.width, cli.height)))
        }
        Some(path) => {
            info!("Reading raw frames from {}", path);
            let file = BufReader::new(File::open(path)?);
            Ok(Box::new(RawVideoReader::new(file, cli.width, cli.height)))
        }
    }
}
