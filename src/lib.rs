//! Hand gesture recognition mapped to desktop input.
//!
//! Per frame, 21 hand landmarks are normalized into a translation and scale
//! invariant feature vector, matched against recorded samples with a
//! nearest-neighbor search, smoothed by a majority vote over recent frames,
//! and turned into scroll or click actions behind a cooldown.

pub mod cli;
pub mod collect;
pub mod config;
pub mod diagnose;
pub mod dispatch;
pub mod error;
pub mod gesture;
#[cfg(feature = "input-enigo")]
pub mod input;
#[cfg(feature = "handpose-ort")]
pub mod model_download;
pub mod pipeline;
pub mod sample_store;
pub mod types;

pub use error::{Error, Result};
