//! Frame sources.
//!
//! The session never talks to a detector directly; it consumes whatever a
//! [`FrameSource`] yields, one frame at a time.

use crate::frame::{FrameRecord, LandmarkFrame};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("recording not found: {0}")]
    NotFound(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Anything that produces landmark frames in delivery order.
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError>;
}

/// Replays a recorded NDJSON landmark stream.
pub struct ReplaySource<R> {
    reader: R,
    canvas: (u32, u32),
    /// Delay between frames; `None` replays as fast as the consumer pulls.
    interval: Option<Duration>,
    line: usize,
    sequence: u32,
    buf: String,
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording on disk.
    pub fn open(path: &Path, canvas: (u32, u32)) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        tracing::info!(
            path = %path.display(),
            width = canvas.0,
            height = canvas.1,
            "opened recording"
        );
        Ok(Self::new(BufReader::new(file), canvas))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R, canvas: (u32, u32)) -> Self {
        Self {
            reader,
            canvas,
            interval: None,
            line: 0,
            sequence: 0,
            buf: String::new(),
        }
    }

    /// Pace delivery at `fps` frames per second. Zero disables pacing.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(fps)));
        self
    }
}

impl<R: BufRead + Send> FrameSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                tracing::debug!(frames = self.sequence, "recording exhausted");
                return Ok(None);
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            let record: FrameRecord = serde_json::from_str(text).map_err(|source| {
                SourceError::Parse {
                    line: self.line,
                    source,
                }
            })?;

            if let Some(interval) = self.interval {
                std::thread::sleep(interval);
            }

            let frame = record.into_frame(self.canvas, self.sequence);
            self.sequence = self.sequence.wrapping_add(1);
            return Ok(Some(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay(text: &str) -> ReplaySource<Cursor<Vec<u8>>> {
        ReplaySource::new(Cursor::new(text.as_bytes().to_vec()), (640, 480))
    }

    #[test]
    fn test_replay_yields_frames_in_order() {
        let mut src = replay(
            "{\"landmarks\": null}\n{\"landmarks\": [{\"x\": 0.5, \"y\": 0.5}], \"width\": 320}\n",
        );

        let first = src.next_frame().unwrap().unwrap();
        assert!(!first.has_face());
        assert_eq!(first.sequence, 0);

        let second = src.next_frame().unwrap().unwrap();
        assert!(second.has_face());
        assert_eq!(second.sequence, 1);
        assert_eq!((second.width, second.height), (320, 480));

        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_replay_skips_blank_lines() {
        let mut src = replay("\n\n{\"landmarks\": null}\n   \n");
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_replay_reports_bad_line_number() {
        let mut src = replay("{\"landmarks\": null}\n\nnot json\n");
        assert!(src.next_frame().unwrap().is_some());
        match src.next_frame() {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_recording() {
        let result = ReplaySource::open(Path::new("/nonexistent/frames.ndjson"), (640, 480));
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_fps_zero_disables_pacing() {
        let src = replay("").with_fps(0);
        assert!(src.interval.is_none());
        let src = replay("").with_fps(25);
        assert_eq!(src.interval, Some(Duration::from_millis(40)));
    }
}
