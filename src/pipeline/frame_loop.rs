use std::{
    io::BufRead,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use super::{GesturePipeline, LandmarkSource, Observation};
use crate::dispatch::{ActionSink, DispatchOutcome};

/// Cooperative stop signal shared between the frame loop and whatever asks
/// it to quit.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    SourceExhausted,
    StopRequested,
    Failsafe,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub hands: usize,
    pub matches: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub stop_reason: StopReason,
}

/// Pulls frames from `source` and runs each through `pipeline` until the
/// source runs dry, `stop` is set, or the sink's failsafe trips. Stop and
/// failsafe are checked before waiting for a frame and again before the
/// frame is processed.
pub fn run_frame_loop<L, S>(
    source: &mut L,
    pipeline: &mut GesturePipeline<S>,
    stop: &StopFlag,
) -> anyhow::Result<RunSummary>
where
    L: LandmarkSource + ?Sized,
    S: ActionSink,
{
    let mut summary = RunSummary::default();

    loop {
        if let Some(reason) = halt_reason(pipeline, stop) {
            summary.stop_reason = reason;
            break;
        }

        let Some(frame) = source.next_frame()? else {
            summary.stop_reason = StopReason::SourceExhausted;
            break;
        };
        // A quit or failsafe raised while waiting discards the frame.
        if let Some(reason) = halt_reason(pipeline, stop) {
            summary.stop_reason = reason;
            break;
        }

        let report = pipeline.process(frame.landmarks.as_deref(), frame.timestamp);
        summary.frames += 1;
        if !matches!(report.observation, Observation::NoHand) {
            summary.hands += 1;
        }
        if report.observation.vote().is_some() {
            summary.matches += 1;
        }
        match report.outcome {
            DispatchOutcome::Dispatched(_) => summary.dispatched += 1,
            DispatchOutcome::Suppressed => summary.suppressed += 1,
            DispatchOutcome::Failed(_) => summary.failed += 1,
            DispatchOutcome::NoAction => {}
        }
        log::trace!(
            "frame {}: {:?} -> {:?} -> {:?}",
            summary.frames,
            report.observation,
            report.stabilized,
            report.outcome
        );
    }

    Ok(summary)
}

fn halt_reason<S: ActionSink>(pipeline: &mut GesturePipeline<S>, stop: &StopFlag) -> Option<StopReason> {
    if stop.is_stopped() {
        log::info!("stop requested, leaving frame loop");
        return Some(StopReason::StopRequested);
    }
    if pipeline.failsafe_triggered() {
        log::warn!("failsafe triggered (pointer in a screen corner), leaving frame loop");
        stop.stop();
        return Some(StopReason::Failsafe);
    }
    None
}

/// Sets `stop` when `q` (or `quit`) is entered on stdin. The listener thread
/// is detached; it exits on its own when stdin closes.
pub fn spawn_quit_listener(stop: StopFlag) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit") {
                stop.stop();
                break;
            }
        }
    })
}
