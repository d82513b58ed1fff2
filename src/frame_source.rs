//! Frame sources: where the already-transcoded video comes from.
//!
//! Every source yields `Option<Result<Frame, FrameError>>`: `None` at end of
//! stream, `Err` for a frame that is missing or unreadable. An `Err` still
//! counts as a frame, so callers keep their frame index advancing, unless
//! `FrameError::is_fatal` says the stream itself broke.

use crate::error::FrameError;
use crate::image_io;
use crate::types::Frame;
use crossbeam_channel::{bounded, Receiver};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        (**self).next_frame()
    }
}

// ─── Raw grayscale stream ───────────────────────────────────────────────────

/// Headerless 8-bit grayscale video, `width * height` bytes per frame, e.g.
/// `ffmpeg ... -pix_fmt gray -f rawvideo -`. Works with files, pipes, stdin.
pub struct RawVideoReader<R: Read> {
    reader: R,
    width: usize,
    height: usize,
    finished: bool,
}

impl<R: Read> RawVideoReader<R> {
    pub fn new(reader: R, width: usize, height: usize) -> Self {
        Self {
            reader,
            width,
            height,
            finished: false,
        }
    }

    /// Fill `buf` as far as the stream allows; returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for RawVideoReader<R> {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        if self.finished {
            return None;
        }
        let Some(expected) = self.width.checked_mul(self.height) else {
            self.finished = true;
            return Some(Err(FrameError::Oversized {
                width: self.width,
                height: self.height,
            }));
        };
        let mut pixels = vec![0u8; expected];
        match self.fill(&mut pixels) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(n) if n < expected => {
                // trailing partial frame: report it once, then end
                self.finished = true;
                Some(Err(FrameError::Truncated {
                    expected,
                    actual: n,
                }))
            }
            Ok(_) => Some(Frame::new(self.width, self.height, pixels)),
            // the stream is gone; the error is fatal downstream
            Err(e) => {
                self.finished = true;
                Some(Err(FrameError::Io(e)))
            }
        }
    }
}

// ─── PGM image sequence ─────────────────────────────────────────────────────

/// A directory of `.pgm` files, one frame each, in file-name order.
pub struct PgmSequence {
    paths: Vec<PathBuf>,
    next: usize,
}

impl PgmSequence {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pgm"))
            })
            .collect();
        paths.sort();
        info!("PGM sequence: {} frames in {:?}", paths.len(), dir);
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for PgmSequence {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        let path = self.paths.get(self.next)?;
        self.next += 1;
        let origin = path.display().to_string();
        Some(match fs::read(path) {
            Ok(data) => image_io::decode_pnm(&data, &origin),
            Err(e) => Err(FrameError::Corrupt {
                origin,
                reason: e.to_string(),
            }),
        })
    }
}

// ─── Reader thread hand-off ─────────────────────────────────────────────────

enum Message {
    Frame(Result<Frame, FrameError>),
    End,
}

/// Receiving end of a decoder thread. Frames arrive in source order.
///
/// The reader sends an explicit end marker once its source is exhausted. If
/// the channel closes without one, the reader died (panic) and the stream is
/// reported as `FrameError::ReaderLost` rather than as a clean end.
pub struct ChannelSource {
    rx: Receiver<Message>,
    done: bool,
}

impl FrameSource for ChannelSource {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(Message::Frame(frame)) => Some(frame),
            Ok(Message::End) => {
                self.done = true;
                None
            }
            Err(_) => {
                self.done = true;
                warn!("Frame reader disconnected without finishing the stream");
                Some(Err(FrameError::ReaderLost))
            }
        }
    }
}

/// Move `source` onto its own thread so decoding overlaps analysis.
/// The bounded channel caps how far the reader runs ahead.
pub fn spawn_reader<S>(mut source: S, capacity: usize) -> io::Result<(ChannelSource, JoinHandle<()>)>
where
    S: FrameSource + Send + 'static,
{
    let (tx, rx) = bounded(capacity);
    let handle = thread::Builder::new()
        .name("frame-reader".into())
        .spawn(move || {
            let mut count: u64 = 0;
            while let Some(frame) = source.next_frame() {
                if tx.send(Message::Frame(frame)).is_err() {
                    debug!("Frame consumer went away after {} frames", count);
                    return;
                }
                count += 1;
            }
            let _ = tx.send(Message::End);
            debug!("Frame reader finished after {} frames", count);
        })?;
    Ok((ChannelSource { rx, done: false }, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_raw_reader_splits_frames() {
        let mut data = vec![0u8; 6];
        data.extend_from_slice(&[255; 6]);
        let mut reader = RawVideoReader::new(Cursor::new(data), 3, 2);
        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!(first.pixels, vec![0; 6]);
        let second = reader.next_frame().unwrap().unwrap();
        assert_eq!(second.row(1), &[255, 255, 255]);
        assert!(reader.next_frame().is_none());
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_raw_reader_reports_trailing_partial_frame() {
        let mut reader = RawVideoReader::new(Cursor::new(vec![7u8; 10]), 3, 2);
        assert!(reader.next_frame().unwrap().is_ok());
        assert!(matches!(
            reader.next_frame(),
            Some(Err(FrameError::Truncated { expected: 6, actual: 4 }))
        ));
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_pgm_sequence_order_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::filled(4, 2, 200);
        for name in ["frame_002.pgm", "frame_000.pgm"] {
            let mut buf = Vec::new();
            image_io::encode_pgm(&frame, &mut buf).unwrap();
            fs::write(dir.path().join(name), buf).unwrap();
        }
        fs::write(dir.path().join("frame_001.pgm"), b"garbage").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut seq = PgmSequence::open(dir.path()).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.next_frame().unwrap().unwrap(), frame);
        match seq.next_frame() {
            Some(Err(FrameError::Corrupt { origin, .. })) => assert!(origin.ends_with("frame_001.pgm")),
            other => panic!("expected corrupt frame, got {:?}", other),
        }
        assert!(seq.next_frame().unwrap().is_ok());
        assert!(seq.next_frame().is_none());
    }

    #[test]
    fn test_channel_source_preserves_order() {
        let mut data = Vec::new();
        for v in 0..20u8 {
            data.extend_from_slice(&[v; 4]);
        }
        let reader = RawVideoReader::new(Cursor::new(data), 2, 2);
        let (mut source, handle) = spawn_reader(reader, 2).unwrap();
        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame() {
            seen.push(frame.unwrap().pixels[0]);
        }
        handle.join().unwrap();
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    }

    /// Yields `good` frames, then panics like a decoder bug would.
    struct Crashing {
        good: u32,
    }

    impl FrameSource for Crashing {
        fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
            if self.good == 0 {
                panic!("decoder bug");
            }
            self.good -= 1;
            Some(Ok(Frame::filled(2, 2, 0)))
        }
    }

    #[test]
    fn test_channel_source_reports_dead_reader() {
        let (mut source, handle) = spawn_reader(Crashing { good: 2 }, 4).unwrap();
        assert!(source.next_frame().unwrap().is_ok());
        assert!(source.next_frame().unwrap().is_ok());
        match source.next_frame() {
            Some(Err(e)) => {
                assert!(matches!(e, FrameError::ReaderLost));
                assert!(e.is_fatal());
            }
            other => panic!("expected a lost reader, got {:?}", other),
        }
        assert!(source.next_frame().is_none());
        assert!(handle.join().is_err());
    }

    /// Hands out `ok` bytes, then fails like a dropped pipe.
    struct FailingRead {
        ok: usize,
    }

    impl Read for FailingRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.ok == 0 {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "decoder exited"));
            }
            let n = buf.len().min(self.ok);
            buf[..n].fill(0);
            self.ok -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_raw_reader_read_error_is_fatal() {
        let mut reader = RawVideoReader::new(FailingRead { ok: 6 }, 3, 2);
        assert!(reader.next_frame().unwrap().is_ok());
        match reader.next_frame() {
            Some(Err(e)) => assert!(e.is_fatal()),
            other => panic!("expected a read failure, got {:?}", other),
        }
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_raw_reader_oversized_dimensions() {
        let mut reader = RawVideoReader::new(Cursor::new(vec![0u8; 4]), usize::MAX, 2);
        assert!(matches!(reader.next_frame(), Some(Err(FrameError::Oversized { .. }))));
        assert!(reader.next_frame().is_none());
    }
}
