//! MediaPipe palm detector. Finds palms in the whole frame so the landmark
//! model only ever sees a crop centred on a hand.

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::handpose::{HandCrop, Letterbox, letterbox_frame};
use crate::types::Frame;

pub const PALM_INPUT_SIZE: u32 = 192;
const PALM_KEYPOINTS: usize = 7;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.3;
const TOP_K: usize = 32;
/// The crop is this many times the palm extent so the fingers fit.
const CROP_EXPANSION: f32 = 2.4;
const MIN_PALM_SIDE: f32 = 80.0;

/// `(stride, anchors per cell)` for each feature map of the SSD head.
const ANCHOR_LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

/// One detected palm in frame pixels, best score first after [`PalmDetector::detect`].
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<(f32, f32)>,
}

impl PalmDetector {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: ssd_anchors(PALM_INPUT_SIZE),
        })
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_frame(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected boxes and scores",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let box_data: Vec<f32> = boxes.iter().copied().collect();
        let score_data: Vec<f32> = scores.iter().copied().collect();

        decode_detections(
            &box_data,
            boxes.shape(),
            &score_data,
            scores.shape(),
            &self.anchors,
            &letterbox,
        )
    }
}

/// Anchor centres in `[0, 1]` input coordinates, row-major per feature map.
fn ssd_anchors(input_size: u32) -> Vec<(f32, f32)> {
    let mut anchors = Vec::new();
    for (stride, per_cell) in ANCHOR_LAYERS {
        let grid = input_size.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = (
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                );
                anchors.extend(std::iter::repeat_n(center, per_cell));
            }
        }
    }
    anchors
}

fn decode_detections(
    boxes: &[f32],
    box_shape: &[usize],
    scores: &[f32],
    score_shape: &[usize],
    anchors: &[(f32, f32)],
    letterbox: &Letterbox,
) -> Result<Vec<PalmRegion>> {
    let &[.., box_count, features] = box_shape else {
        return Err(anyhow!("unexpected palm box shape {box_shape:?}"));
    };
    let &[.., score_count, score_width] = score_shape else {
        return Err(anyhow!("unexpected palm score shape {score_shape:?}"));
    };
    let needed = 4 + PALM_KEYPOINTS * 2;
    if features < needed || score_width == 0 {
        return Err(anyhow!(
            "palm outputs too narrow: {features} box values, {score_width} scores per anchor"
        ));
    }

    let count = anchors.len().min(box_count).min(score_count);
    if boxes.len() < count * features || scores.len() < count * score_width {
        return Err(anyhow!("palm outputs shorter than their shapes"));
    }

    let input = PALM_INPUT_SIZE as f32;
    let to_frame = |nx: f32, ny: f32| {
        (
            (nx * input - letterbox.pad_x) / letterbox.scale,
            (ny * input - letterbox.pad_y) / letterbox.scale,
        )
    };
    let (max_x, max_y) = (letterbox.orig_w as f32, letterbox.orig_h as f32);

    let mut candidates = Vec::new();
    for (i, &(ax, ay)) in anchors.iter().take(count).enumerate() {
        let score = sigmoid(scores[i * score_width]);
        if score < SCORE_THRESHOLD {
            continue;
        }

        let row = &boxes[i * features..i * features + needed];
        let cx = row[0] / input + ax;
        let cy = row[1] / input + ay;
        let (w, h) = (row[2] / input, row[3] / input);

        let (x1, y1) = to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = to_frame(cx + w / 2.0, cy + h / 2.0);
        let bbox = [
            x1.clamp(0.0, max_x),
            y1.clamp(0.0, max_y),
            x2.clamp(0.0, max_x),
            y2.clamp(0.0, max_y),
        ];
        if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
            continue;
        }

        let keypoints = row[4..]
            .chunks_exact(2)
            .map(|kp| to_frame(kp[0] / input + ax, kp[1] / input + ay))
            .collect();

        candidates.push(PalmRegion {
            bbox,
            keypoints,
            score,
        });
    }

    Ok(suppress_overlaps(candidates, NMS_THRESHOLD, TOP_K))
}

/// Greedy non-maximum suppression, highest score first.
fn suppress_overlaps(mut regions: Vec<PalmRegion>, threshold: f32, limit: usize) -> Vec<PalmRegion> {
    regions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for region in regions {
        if kept.len() >= limit {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &region.bbox) < threshold) {
            kept.push(region);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Square crop around a palm, turned so the fingers point up in the crop.
pub(super) fn crop_around(region: &PalmRegion) -> HandCrop {
    let [x1, y1, x2, y2] = region.bbox;
    let center = if region.keypoints.is_empty() {
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    } else {
        let n = region.keypoints.len() as f32;
        let (sx, sy) = region
            .keypoints
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        (sx / n, sy / n)
    };

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x1, y1, x2, y2);
    for &(x, y) in &region.keypoints {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let extent = (max_x - min_x).max(max_y - min_y).max(MIN_PALM_SIDE);

    HandCrop {
        center,
        side: extent * CROP_EXPANSION,
        angle: orientation(&region.keypoints, center) - PI / 2.0,
    }
}

/// Principal axis of the keypoints, in radians from the x axis. Vertical
/// spread gives `PI / 2`, so an upright hand needs no rotation.
fn orientation(points: &[(f32, f32)], center: (f32, f32)) -> f32 {
    if points.len() < 2 {
        return PI / 2.0;
    }

    let (mut xx, mut xy, mut yy) = (0.0f32, 0.0f32, 0.0f32);
    for &(x, y) in points {
        let (dx, dy) = (x - center.0, y - center.1);
        xx += dx * dx;
        xy += dx * dy;
        yy += dy * dy;
    }
    let n = points.len() as f32;
    let (xx, xy, yy) = (xx / n, xy / n, yy / n);

    let trace = xx + yy;
    let det = xx * yy - xy * xy;
    let largest = trace / 2.0 + ((trace * trace / 4.0) - det).max(0.0).sqrt();

    let (vx, vy) = if xy.abs() > 1e-6 {
        (largest - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };
    vy.atan2(vx)
}
