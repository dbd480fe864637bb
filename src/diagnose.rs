//! Hand-detection check: how often the landmark source actually sees a hand.

use std::fmt;

use crate::{
    gesture,
    pipeline::{LandmarkSource, StopFlag},
};

pub const DEFAULT_DIAGNOSE_FRAMES: usize = 300;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnoseSummary {
    pub frames: usize,
    /// Frames where the source reported a hand.
    pub hands: usize,
    /// Hands whose landmarks normalized into a usable feature vector.
    pub usable: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detection {
    Good,
    Fair,
    Poor,
}

impl DiagnoseSummary {
    /// Share of frames with a hand, in percent. Zero when no frames were read.
    pub fn detection_rate(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.hands as f64 * 100.0 / self.frames as f64
    }

    pub fn detection(&self) -> Detection {
        match self.detection_rate() {
            rate if rate > 80.0 => Detection::Good,
            rate if rate > 50.0 => Detection::Fair,
            _ => Detection::Poor,
        }
    }
}

impl Detection {
    pub fn advice(self) -> &'static str {
        match self {
            Detection::Good => "hand detection is reliable",
            Detection::Fair => "hand detection is patchy, try better lighting",
            Detection::Poor => {
                "hand detection is poor, improve the lighting and keep the hand centred in view"
            }
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Detection::Good => "good",
            Detection::Fair => "fair",
            Detection::Poor => "poor",
        })
    }
}

/// Reads up to `max_frames` frames, or until the source runs dry or `stop`
/// is set, counting frames with a hand.
pub fn diagnose<L>(
    source: &mut L,
    max_frames: usize,
    stop: &StopFlag,
) -> anyhow::Result<DiagnoseSummary>
where
    L: LandmarkSource + ?Sized,
{
    let mut summary = DiagnoseSummary::default();

    while summary.frames < max_frames && !stop.is_stopped() {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        summary.frames += 1;

        let Some(landmarks) = frame.landmarks else {
            continue;
        };
        summary.hands += 1;
        match gesture::normalize(&landmarks) {
            Ok(_) => summary.usable += 1,
            Err(err) => log::debug!("frame {}: {err}", summary.frames),
        }
        if summary.frames % 30 == 0 {
            log::info!(
                "{} hands in {} frames ({:.1}%)",
                summary.hands,
                summary.frames,
                summary.detection_rate()
            );
        }
    }

    Ok(summary)
}
