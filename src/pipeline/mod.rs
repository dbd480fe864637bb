#[cfg(feature = "camera-nokhwa")]
pub mod camera;
mod frame_loop;
#[cfg(feature = "handpose-ort")]
pub mod handpose;
#[cfg(all(feature = "camera-nokhwa", feature = "handpose-ort"))]
mod live;
#[cfg(feature = "handpose-ort")]
mod palm;
mod recognition;
mod replay;

pub use frame_loop::{RunSummary, StopFlag, StopReason, run_frame_loop, spawn_quit_listener};
#[cfg(all(feature = "camera-nokhwa", feature = "handpose-ort"))]
pub use live::CameraLandmarkSource;
pub use recognition::{FrameReport, GesturePipeline, Observation};
pub use replay::{DEFAULT_REPLAY_FPS, ReplaySource, format_replay_line};

use crate::types::LandmarkFrame;

/// Upstream producer of per-frame hand landmarks.
pub trait LandmarkSource {
    /// Blocks until the next frame is available. `Ok(None)` means the source
    /// is exhausted or the capture device went away.
    fn next_frame(&mut self) -> anyhow::Result<Option<LandmarkFrame>>;
}

impl<L: LandmarkSource + ?Sized> LandmarkSource for Box<L> {
    fn next_frame(&mut self) -> anyhow::Result<Option<LandmarkFrame>> {
        (**self).next_frame()
    }
}
