use std::{fmt, str::FromStr, time::Instant};

use serde::{Deserialize, Serialize};

/// Number of landmarks the upstream detector reports per hand.
pub const NUM_LANDMARKS: usize = 21;
/// Length of a feature vector: `NUM_LANDMARKS` points, x before y.
pub const FEATURE_LEN: usize = NUM_LANDMARKS * 2;

/// One hand landmark in image-normalized coordinates.
pub type Landmark = (f32, f32);

/// Raw RGB camera frame handed from the capture thread to the recognizer.
#[cfg(any(feature = "camera-nokhwa", feature = "handpose-ort"))]
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// Landmarks observed for one captured frame. `landmarks` is `None` when no
/// hand was detected.
#[derive(Clone, Debug)]
pub struct LandmarkFrame {
    pub landmarks: Option<Vec<Landmark>>,
    pub timestamp: Instant,
}

/// Translation and scale invariant encoding of one landmark set.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    /// Builds a vector from exactly `FEATURE_LEN` finite values.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        if values.len() != FEATURE_LEN || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mut data = [0.0; FEATURE_LEN];
        data.copy_from_slice(values);
        Some(Self(data))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn distance(&self, other: &FeatureVector) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<[f32; FEATURE_LEN]> for FeatureVector {
    fn from(values: [f32; FEATURE_LEN]) -> Self {
        Self(values)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    Palm,
    Fist,
    Peace,
    ThumbsUp,
}

impl GestureLabel {
    /// Fixed enumeration order. Classification ties resolve to the earliest
    /// label in this list.
    pub const ALL: [GestureLabel; 4] = [
        GestureLabel::Palm,
        GestureLabel::Fist,
        GestureLabel::Peace,
        GestureLabel::ThumbsUp,
    ];

    pub fn index(&self) -> usize {
        match self {
            GestureLabel::Palm => 0,
            GestureLabel::Fist => 1,
            GestureLabel::Peace => 2,
            GestureLabel::ThumbsUp => 3,
        }
    }

    /// Stem of the sample file holding this label's training data.
    pub fn file_stem(&self) -> &'static str {
        match self {
            GestureLabel::Palm => "palm",
            GestureLabel::Fist => "fist",
            GestureLabel::Peace => "peace",
            GestureLabel::ThumbsUp => "thumbs_up",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GestureLabel::Palm => "Palm",
            GestureLabel::Fist => "Fist",
            GestureLabel::Peace => "Peace",
            GestureLabel::ThumbsUp => "Thumbs Up",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureLabel::Palm => "🖐 ",
            GestureLabel::Fist => "✊ ",
            GestureLabel::Peace => "✌️ ",
            GestureLabel::ThumbsUp => "👍 ",
        }
    }

    /// How to hold the hand when recording samples for this label.
    pub fn description(&self) -> &'static str {
        match self {
            GestureLabel::Palm => "open palm, all fingers extended",
            GestureLabel::Fist => "closed fist, all fingers folded",
            GestureLabel::Peace => "index and middle fingers up",
            GestureLabel::ThumbsUp => "only the thumb extended",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.file_stem())
    }
}

impl FromStr for GestureLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "palm" => Ok(GestureLabel::Palm),
            "fist" | "stone" => Ok(GestureLabel::Fist),
            "peace" => Ok(GestureLabel::Peace),
            "thumbs_up" | "thumbsup" => Ok(GestureLabel::ThumbsUp),
            other => Err(format!("unknown gesture label `{other}`")),
        }
    }
}
