//! Landmark recordings: one frame per line, either 42 comma-separated raw
//! coordinates (`x0,y0,...,x20,y20` in image-normalized units) or `-` / a
//! blank line for a frame without a hand. Lines starting with `#` are
//! comments.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    time::{Duration, Instant},
};

use anyhow::Context;

use super::LandmarkSource;
use crate::types::{Landmark, LandmarkFrame};

pub const DEFAULT_REPLAY_FPS: u32 = 30;

/// Replays a landmark recording with synthetic timestamps spaced at a fixed
/// frame rate, starting from when the source was opened.
pub struct ReplaySource<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    frame_index: u32,
    start: Instant,
    frame_interval: Duration,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path, fps: u32) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open landmark recording {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file), fps))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn from_reader(reader: R, fps: u32) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            frame_index: 0,
            start: Instant::now(),
            frame_interval: Duration::from_secs(1) / fps.max(1),
        }
    }
}

impl<R: BufRead> LandmarkSource for ReplaySource<R> {
    fn next_frame(&mut self) -> anyhow::Result<Option<LandmarkFrame>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .context("failed to read landmark recording")?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let Ok(line) = std::str::from_utf8(&self.buf) else {
                log::warn!("recording line {}: not valid UTF-8, treating as no hand", self.line_no);
                return Ok(Some(self.frame(None)));
            };
            let trimmed = line.trim();
            if trimmed.starts_with('#') {
                continue;
            }

            let landmarks = if trimmed.is_empty() || trimmed == "-" {
                None
            } else {
                match parse_landmarks(trimmed) {
                    Ok(points) => Some(points),
                    Err(reason) => {
                        log::warn!("recording line {}: {reason}, treating as no hand", self.line_no);
                        None
                    }
                }
            };

            return Ok(Some(self.frame(landmarks)));
        }
    }
}

impl<R> ReplaySource<R> {
    fn frame(&mut self, landmarks: Option<Vec<Landmark>>) -> LandmarkFrame {
        let timestamp = self.start + self.frame_interval * self.frame_index;
        self.frame_index += 1;
        LandmarkFrame {
            landmarks,
            timestamp,
        }
    }
}

fn parse_landmarks(line: &str) -> Result<Vec<Landmark>, String> {
    let values = line
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| format!("`{}` is not a number", v.trim()))
        })
        .collect::<Result<Vec<f32>, String>>()?;
    if values.len() % 2 != 0 {
        return Err(format!("odd number of coordinates ({})", values.len()));
    }
    Ok(values.chunks_exact(2).map(|xy| (xy[0], xy[1])).collect())
}

/// Formats landmarks as one recording line.
pub fn format_replay_line(landmarks: Option<&[Landmark]>) -> String {
    match landmarks {
        None => "-".to_string(),
        Some(points) => points
            .iter()
            .map(|(x, y)| format!("{x},{y}"))
            .collect::<Vec<_>>()
            .join(","),
    }
}
