use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "no usable gesture samples found in {}; record some with `gesture-control collect`",
        dir.display()
    )]
    NoTrainingData { dir: PathBuf },

    #[error(
        "camera unavailable: {reason}. Check that the camera is connected, not used by another application, and that this program has camera permission"
    )]
    CaptureUnavailable { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
