use crate::coordinator::RunStats;
use crate::sheet_composer::SheetMusic;
use crate::types::*;
use log::info;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RAW_LOG_FILE: &str = "output.txt";
pub const TABLE_LOG_FILE: &str = "output.csv";
pub const SHEET_FILE: &str = "sheet.txt";
pub const STATS_FILE: &str = "stats.json";

/// Per-frame key state log: a raw `[v0, ..., v87] HH:MM:SS.ffffff` line log
/// and a CSV table with one column per key.
///
/// Every `append` flushes both writers before returning, so an interrupted
/// run leaves whole records behind.
pub struct StateLog<W: Write> {
    raw: W,
    table: W,
    mode: ValueMode,
    records: u64,
}

impl StateLog<BufWriter<File>> {
    /// Create (truncating) `output.txt` and `output.csv` in `dir`.
    pub fn create(dir: &Path, labels: &[String], mode: ValueMode) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let raw = BufWriter::new(File::create(dir.join(RAW_LOG_FILE))?);
        let table = BufWriter::new(File::create(dir.join(TABLE_LOG_FILE))?);
        info!("State log → {:?} ({:?} values)", dir, mode);
        Self::new(raw, table, labels, mode)
    }
}

impl<W: Write> StateLog<W> {
    /// Wrap two writers and emit the CSV header.
    pub fn new(raw: W, mut table: W, labels: &[String], mode: ValueMode) -> io::Result<Self> {
        writeln!(table, "timestamp,{}", labels.join(","))?;
        table.flush()?;
        Ok(Self {
            raw,
            table,
            mode,
            records: 0,
        })
    }

    pub fn append(&mut self, timestamp: Duration, analysis: &FrameAnalysis) -> io::Result<()> {
        let values = self.values(analysis);
        let stamp = format_timestamp(timestamp);

        writeln!(self.raw, "[{}] {}", values.join(", "), stamp)?;
        self.raw.flush()?;
        writeln!(self.table, "{},{}", stamp, values.join(","))?;
        self.table.flush()?;

        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn mode(&self) -> ValueMode {
        self.mode
    }

    pub fn into_inner(self) -> (W, W) {
        (self.raw, self.table)
    }

    fn values(&self, analysis: &FrameAnalysis) -> Vec<String> {
        match self.mode {
            ValueMode::Binary => analysis
                .activation
                .as_slice()
                .iter()
                .map(|&on| (if on { "1" } else { "0" }).to_string())
                .collect(),
            ValueMode::Percent => analysis
                .brightness
                .iter()
                .map(|b| format!("{:.2}", b))
                .collect(),
        }
    }
}

// ─── End-of-run outputs ─────────────────────────────────────────────────────

/// Write the sheet music, one line per row. Returns the path written.
pub fn write_sheet(dir: &Path, sheet: &SheetMusic) -> io::Result<PathBuf> {
    let path = dir.join(SHEET_FILE);
    let mut out = BufWriter::new(File::create(&path)?);
    sheet.write_to(&mut out)?;
    out.flush()?;
    info!("Sheet music: {} rows → {:?}", sheet.rows().len(), path);
    Ok(path)
}

pub fn write_stats(dir: &Path, stats: &RunStats) -> io::Result<PathBuf> {
    let path = dir.join(STATS_FILE);
    let json = serde_json::to_string_pretty(stats).map_err(io::Error::other)?;
    fs::write(&path, json)?;
    Ok(path)
}
