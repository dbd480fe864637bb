//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    collect::{DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLE_INTERVAL},
    config::Config,
    diagnose::DEFAULT_DIAGNOSE_FRAMES,
    pipeline::DEFAULT_REPLAY_FPS,
    types::GestureLabel,
};

const DEFAULT_SAMPLE_INTERVAL_MS: u64 = DEFAULT_SAMPLE_INTERVAL.as_millis() as u64;

/// Touchless desktop control: hand gestures from a camera become scrolls and
/// clicks.
#[derive(Parser, Debug)]
#[command(name = "gesture-control")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log every frame decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ./gesture-control.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recognize gestures and perform their actions until `q` is entered
    Run(RunArgs),

    /// Record training samples for one gesture, or for all of them in turn
    Collect {
        /// Gesture to record (palm, fist, peace, thumbs_up); all four when omitted
        #[arg(short, long)]
        label: Option<GestureLabel>,

        /// Number of samples to take per gesture
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_COUNT)]
        samples: usize,

        /// Minimum time between two samples, in milliseconds
        #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS)]
        interval_ms: u64,

        /// Read landmarks from a recording instead of the camera
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Add to the existing samples instead of replacing them
        #[arg(long)]
        append: bool,
    },

    /// Report on the gesture data directory
    Check,

    /// Measure how often a hand is detected, to troubleshoot lighting and position
    Diagnose {
        /// Frames to examine before reporting
        #[arg(short, long, default_value_t = DEFAULT_DIAGNOSE_FRAMES)]
        frames: usize,

        /// Read landmarks from a recording instead of the camera
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Repair sample files whose values were split across lines
    Reformat,

    /// Write the default configuration
    InitConfig {
        /// Destination file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List cameras the capture backend can open
    #[cfg(feature = "camera-nokhwa")]
    Cameras,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Read landmarks from a recording instead of the camera
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Frame rate assumed for the recording
    #[arg(long, default_value_t = DEFAULT_REPLAY_FPS)]
    pub fps: u32,

    /// Log actions instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Override recognition.threshold
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Override dispatch.cooldown_secs
    #[arg(long)]
    pub cooldown: Option<f64>,

    /// Override recognition.window_size
    #[arg(long)]
    pub window: Option<usize>,

    /// Override dispatch.scroll_magnitude
    #[arg(long)]
    pub scroll: Option<i32>,
}

impl RunArgs {
    /// Applies the command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.recognition.threshold = threshold;
        }
        if let Some(cooldown) = self.cooldown {
            config.dispatch.cooldown_secs = cooldown;
        }
        if let Some(window) = self.window {
            config.recognition.window_size = window;
        }
        if let Some(scroll) = self.scroll {
            config.dispatch.scroll_magnitude = scroll;
        }
    }
}
