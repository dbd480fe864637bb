//! Landmark normalization, nearest-neighbor matching and temporal
//! stabilization of per-frame gesture votes.

mod classifier;
mod stabilizer;

pub use classifier::{Classification, DEFAULT_THRESHOLD, classify};
pub use stabilizer::{DEFAULT_WINDOW_SIZE, Stabilized, Stabilizer};

use thiserror::Error;

use crate::types::{FEATURE_LEN, FeatureVector, Landmark, NUM_LANDMARKS};

/// Hands whose bounding box is smaller than this cannot be normalized.
const MIN_SCALE: f32 = 1e-6;

/// Reasons a landmark set cannot be turned into a feature vector. Every
/// variant is treated as "no hand detected" for the frame.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum NormalizeError {
    #[error("expected {NUM_LANDMARKS} landmarks, got {0}")]
    LandmarkCount(usize),
    #[error("landmark {0} has a non-finite coordinate")]
    NonFinite(usize),
    #[error("hand bounding box is degenerate (scale {0})")]
    DegenerateScale(f32),
}

/// Normalizes a landmark set to a feature vector: the wrist becomes the
/// origin and all coordinates are divided by the longer side of the hand's
/// bounding box. Output order is `[x0, y0, x1, y1, ..., x20, y20]`.
///
/// Samples written by `collect` go through this same function, so training
/// and live vectors are directly comparable.
pub fn normalize(landmarks: &[Landmark]) -> Result<FeatureVector, NormalizeError> {
    if landmarks.len() != NUM_LANDMARKS {
        return Err(NormalizeError::LandmarkCount(landmarks.len()));
    }
    if let Some(idx) = landmarks
        .iter()
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(NormalizeError::NonFinite(idx));
    }

    let (min_x, max_x, min_y, max_y) = landmarks.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
    );
    // Coordinates near f32::MAX overflow the extent to infinity.
    let scale = (max_x - min_x).max(max_y - min_y);
    if !scale.is_finite() || scale <= MIN_SCALE {
        return Err(NormalizeError::DegenerateScale(scale));
    }

    let wrist = landmarks[0];
    let mut values = [0.0f32; FEATURE_LEN];
    for (idx, &(x, y)) in landmarks.iter().enumerate() {
        values[idx * 2] = (x - wrist.0) / scale;
        values[idx * 2 + 1] = (y - wrist.1) / scale;
    }

    Ok(FeatureVector::from(values))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A right hand held up with fingers spread, roughly as MediaPipe reports
    /// it for a palm facing the camera.
    pub(crate) fn open_hand() -> Vec<Landmark> {
        vec![
            (0.50, 0.80),
            (0.44, 0.76),
            (0.40, 0.70),
            (0.37, 0.64),
            (0.34, 0.59),
            (0.45, 0.60),
            (0.44, 0.52),
            (0.44, 0.47),
            (0.44, 0.42),
            (0.50, 0.59),
            (0.50, 0.50),
            (0.50, 0.44),
            (0.50, 0.39),
            (0.55, 0.60),
            (0.56, 0.52),
            (0.56, 0.47),
            (0.56, 0.43),
            (0.59, 0.62),
            (0.61, 0.56),
            (0.62, 0.52),
            (0.63, 0.49),
        ]
    }

    fn assert_close(a: &FeatureVector, b: &FeatureVector) {
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-4, "{x} != {y}");
        }
    }

    #[test]
    fn wrist_becomes_origin() {
        let vector = normalize(&open_hand()).unwrap();
        assert_eq!(vector.as_slice()[0], 0.0);
        assert_eq!(vector.as_slice()[1], 0.0);
    }

    #[test]
    fn invariant_under_translation_and_scale() {
        let hand = open_hand();
        let base = normalize(&hand).unwrap();

        let moved: Vec<Landmark> = hand.iter().map(|(x, y)| (x - 0.2, y + 0.1)).collect();
        assert_close(&base, &normalize(&moved).unwrap());

        let scaled: Vec<Landmark> = hand
            .iter()
            .map(|(x, y)| (0.1 + x * 0.5, 0.05 + y * 0.5))
            .collect();
        assert_close(&base, &normalize(&scaled).unwrap());

        let enlarged: Vec<Landmark> = hand.iter().map(|(x, y)| (x * 1.7, y * 1.7)).collect();
        assert_close(&base, &normalize(&enlarged).unwrap());
    }

    #[test]
    fn output_follows_landmark_order() {
        let hand = open_hand();
        let vector = normalize(&hand).unwrap();
        // Middle fingertip (12) sits straight above the wrist in this pose.
        let scale = 0.80 - 0.39;
        assert!((vector.as_slice()[24] - 0.0).abs() < 1e-6);
        assert!((vector.as_slice()[25] - (0.39 - 0.80) / scale).abs() < 1e-5);
    }

    #[test]
    fn rejects_wrong_landmark_count() {
        let mut hand = open_hand();
        hand.pop();
        assert_eq!(normalize(&hand), Err(NormalizeError::LandmarkCount(20)));
        assert_eq!(normalize(&[]), Err(NormalizeError::LandmarkCount(0)));
    }

    #[test]
    fn rejects_degenerate_hand() {
        let collapsed = vec![(0.3, 0.3); NUM_LANDMARKS];
        assert!(matches!(
            normalize(&collapsed),
            Err(NormalizeError::DegenerateScale(_))
        ));
    }

    #[test]
    fn rejects_hand_whose_extent_overflows() {
        let mut hand = open_hand();
        hand[4] = (3e38, 0.5);
        hand[8] = (-3e38, 0.5);
        assert_eq!(
            normalize(&hand),
            Err(NormalizeError::DegenerateScale(f32::INFINITY))
        );
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let mut hand = open_hand();
        hand[7] = (f32::NAN, 0.4);
        assert_eq!(normalize(&hand), Err(NormalizeError::NonFinite(7)));
    }
}
