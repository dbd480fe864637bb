use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Sender, TrySendError};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use crate::types::Frame;

// Formats most webcams deliver without an extra conversion step; MJPEG last
// because decoding it costs the most per frame.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

/// Consecutive failed reads after which the device is treated as gone.
const MAX_CONSECUTIVE_FAILURES: u32 = 40;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Counts consecutive read failures; a long enough run means the device is
/// gone and capture should end so the receiver sees a disconnect.
#[derive(Debug)]
struct ReadFailures {
    consecutive: u32,
    limit: u32,
}

impl ReadFailures {
    fn new(limit: u32) -> Self {
        Self {
            consecutive: 0,
            limit,
        }
    }

    /// Records a failure and returns `true` once the limit is reached.
    fn record(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.limit
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Capture thread feeding frames into a channel. Dropping the stream stops
/// the thread and releases the device.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Names of the cameras the platform backend can see, by index.
pub fn available_cameras() -> Result<Vec<(CameraIndex, String)>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| (info.index().clone(), info.human_name()))
        .collect())
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub fn start_camera_stream(index: u32, frame_tx: Sender<Frame>) -> Result<CameraStream> {
    let index = CameraIndex::Index(index);
    // Fail fast before spawning the capture thread.
    drop(build_camera(index.clone())?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        log::info!(
            "camera streaming at {}x{} @ {} fps",
            camera.resolution().width(),
            camera.resolution().height(),
            camera.frame_rate()
        );

        let mut failures = ReadFailures::new(MAX_CONSECUTIVE_FAILURES);
        while !stop_flag.load(Ordering::Relaxed) {
            let decoded = match camera.frame() {
                Ok(buffer) => buffer.decode_image::<RgbFormat>().map_err(|err| {
                    log::warn!("failed to decode camera frame: {err:?}");
                }),
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    Err(())
                }
            };
            let Ok(decoded) = decoded else {
                if failures.record() {
                    log::error!(
                        "camera failed {} times in a row, stopping capture",
                        failures.consecutive
                    );
                    break;
                }
                thread::sleep(RETRY_DELAY);
                continue;
            };
            failures.reset();

            let frame = Frame {
                width: decoded.width(),
                height: decoded.height(),
                rgb: decoded.into_raw(),
                timestamp: Instant::now(),
            };

            // Drop the frame if the recognizer is still busy with the last one.
            match frame_tx.try_send(frame) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("frame receiver gone, stopping capture");
                    break;
                }
            }
        }

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
