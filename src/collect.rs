//! Recording training samples for one gesture.

use std::time::{Duration, Instant};

use crate::{
    gesture,
    pipeline::{LandmarkSource, StopFlag},
    types::FeatureVector,
};

pub const DEFAULT_SAMPLE_COUNT: usize = 20;
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectSummary {
    pub samples: Vec<FeatureVector>,
    pub frames: usize,
    /// Frames with a hand whose landmarks could not be normalized.
    pub rejected: usize,
}

/// Reply to the prompt shown before each gesture of a guided session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextGesture {
    Record,
    Skip,
    Quit,
}

impl NextGesture {
    /// Empty input records; `s`/`skip` and `q`/`quit` are case-insensitive.
    /// Anything else records too.
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().to_ascii_lowercase().as_str() {
            "s" | "skip" => NextGesture::Skip,
            "q" | "quit" => NextGesture::Quit,
            _ => NextGesture::Record,
        }
    }
}

/// Pulls frames until `target` samples are taken, the source runs dry or
/// `stop` is set. Accepted samples are at least `interval` apart in frame
/// time so consecutive near-identical frames don't flood the store.
pub fn collect_samples<L>(
    source: &mut L,
    target: usize,
    interval: Duration,
    stop: &StopFlag,
) -> anyhow::Result<CollectSummary>
where
    L: LandmarkSource + ?Sized,
{
    let mut summary = CollectSummary::default();
    let mut last_taken: Option<Instant> = None;

    while summary.samples.len() < target && !stop.is_stopped() {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        summary.frames += 1;

        let Some(landmarks) = frame.landmarks else {
            continue;
        };
        if let Some(last) = last_taken {
            if frame.timestamp.saturating_duration_since(last) < interval {
                continue;
            }
        }

        match gesture::normalize(&landmarks) {
            Ok(vector) => {
                summary.samples.push(vector);
                last_taken = Some(frame.timestamp);
                log::info!("sample {}/{target}", summary.samples.len());
            }
            Err(err) => {
                summary.rejected += 1;
                log::debug!("skipping frame: {err}");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gesture::tests::open_hand, pipeline::ReplaySource, pipeline::format_replay_line};
    use std::io::Cursor;

    fn recording(lines: &[Option<Vec<(f32, f32)>>]) -> ReplaySource<Cursor<String>> {
        let text = lines
            .iter()
            .map(|l| format_replay_line(l.as_deref()))
            .collect::<Vec<_>>()
            .join("\n");
        ReplaySource::from_reader(Cursor::new(text), 10)
    }

    #[test]
    fn takes_spaced_samples_until_target() {
        let hand = open_hand();
        let mut source = recording(&vec![Some(hand.clone()); 10]);

        // 100 ms between frames, 250 ms interval: frames 0, 3, 6.
        let summary =
            collect_samples(&mut source, 3, Duration::from_millis(250), &StopFlag::new()).unwrap();
        assert_eq!(summary.samples.len(), 3);
        assert_eq!(summary.frames, 7);
        assert_eq!(summary.samples[0], gesture::normalize(&hand).unwrap());
    }

    #[test]
    fn skips_empty_and_degenerate_frames() {
        let mut source = recording(&[
            None,
            Some(vec![(0.5, 0.5); 21]),
            Some(open_hand()),
        ]);
        let summary =
            collect_samples(&mut source, 5, Duration::ZERO, &StopFlag::new()).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.samples.len(), 1);
    }

    #[test]
    fn prompt_replies() {
        assert_eq!(NextGesture::from_reply(""), NextGesture::Record);
        assert_eq!(NextGesture::from_reply("\n"), NextGesture::Record);
        assert_eq!(NextGesture::from_reply(" S "), NextGesture::Skip);
        assert_eq!(NextGesture::from_reply("skip"), NextGesture::Skip);
        assert_eq!(NextGesture::from_reply("Q"), NextGesture::Quit);
        assert_eq!(NextGesture::from_reply("quit\r"), NextGesture::Quit);
        assert_eq!(NextGesture::from_reply("ready"), NextGesture::Record);
    }

    #[test]
    fn one_recording_feeds_consecutive_gestures() {
        let mut source = recording(&vec![Some(open_hand()); 5]);
        let stop = StopFlag::new();
        let first = collect_samples(&mut source, 2, Duration::ZERO, &stop).unwrap();
        let second = collect_samples(&mut source, 2, Duration::ZERO, &stop).unwrap();
        let third = collect_samples(&mut source, 2, Duration::ZERO, &stop).unwrap();
        assert_eq!(first.samples.len(), 2);
        assert_eq!(second.samples.len(), 2);
        assert_eq!(third.samples.len(), 1);
        assert_eq!(third.frames, 1);
    }

    #[test]
    fn stop_flag_ends_collection() {
        let mut source = recording(&vec![Some(open_hand()); 5]);
        let stop = StopFlag::new();
        stop.stop();
        let summary = collect_samples(&mut source, 5, Duration::ZERO, &stop).unwrap();
        assert_eq!(summary.frames, 0);
        assert!(summary.samples.is_empty());
    }
}
