use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use super::{
    LandmarkSource,
    camera::{CameraStream, start_camera_stream},
    handpose::HandposeEngine,
};
use crate::{
    config::CaptureConfig,
    error::Error,
    model_download::{ensure_handpose_model, ensure_palm_model},
    types::{Frame, Landmark, LandmarkFrame},
};

/// Longest wait for a camera frame before the loop gets an empty frame and a
/// chance to see a stop request.
const FRAME_WAIT: Duration = Duration::from_millis(250);

/// Landmarks straight from the webcam: a capture thread feeds the newest
/// frame into a one-slot channel and the palm detector plus handpose model
/// run on whatever is latest when the loop asks for the next frame.
pub struct CameraLandmarkSource {
    engine: HandposeEngine,
    frame_rx: Receiver<Frame>,
    mirror: bool,
    min_confidence: f32,
    _stream: CameraStream,
}

impl CameraLandmarkSource {
    pub fn open(config: &CaptureConfig) -> anyhow::Result<Self> {
        ensure_palm_model(&config.palm_model_path)?;
        ensure_handpose_model(&config.model_path)?;
        let engine = HandposeEngine::new(&config.model_path, &config.palm_model_path)?;

        let (frame_tx, frame_rx) = bounded(1);
        let stream = start_camera_stream(config.camera_index, frame_tx).map_err(|err| {
            Error::CaptureUnavailable {
                reason: format!("camera {}: {err:#}", config.camera_index),
            }
        })?;

        Ok(Self {
            engine,
            frame_rx,
            mirror: config.mirror,
            min_confidence: config.min_hand_confidence,
            _stream: stream,
        })
    }

    fn landmarks(&mut self, frame: &Frame) -> Option<Vec<Landmark>> {
        let output = match self.engine.infer(frame) {
            Ok(Some(output)) => output,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("handpose inference failed: {err:?}");
                return None;
            }
        };
        if output.confidence < self.min_confidence {
            log::trace!("hand confidence {:.2} below threshold", output.confidence);
            return None;
        }
        Some(mirror_landmarks(output.landmarks, self.mirror))
    }
}

impl LandmarkSource for CameraLandmarkSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<LandmarkFrame>> {
        let frame = match recv_latest_frame(&self.frame_rx, FRAME_WAIT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("no camera frame within {FRAME_WAIT:?}");
                return Ok(Some(LandmarkFrame {
                    landmarks: None,
                    timestamp: Instant::now(),
                }));
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("camera stream ended");
                return Ok(None);
            }
        };
        let landmarks = self.landmarks(&frame);
        Ok(Some(LandmarkFrame {
            landmarks,
            timestamp: frame.timestamp,
        }))
    }
}

/// Waits up to `timeout` for one frame, then skips ahead to the newest one
/// queued.
fn recv_latest_frame(
    frame_rx: &Receiver<Frame>,
    timeout: Duration,
) -> Result<Frame, RecvTimeoutError> {
    let mut latest = frame_rx.recv_timeout(timeout)?;
    while let Ok(newer) = frame_rx.try_recv() {
        latest = newer;
    }
    Ok(latest)
}

fn mirror_landmarks(landmarks: Vec<Landmark>, mirror: bool) -> Vec<Landmark> {
    if !mirror {
        return landmarks;
    }
    landmarks.into_iter().map(|(x, y)| (1.0 - x, y)).collect()
}
