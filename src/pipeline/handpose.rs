//! Hand landmark extraction with the MediaPipe models (ONNX): the palm
//! detector finds the hand, the handpose estimator reads 21 landmarks from a
//! rotated square crop around it.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::Array4;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use super::palm::{PalmDetector, crop_around};
use crate::types::{Frame, Landmark, NUM_LANDMARKS};

const INPUT_SIZE: u32 = 224;

/// Landmarks in image-normalized coordinates plus the combined palm and
/// handpose score.
#[derive(Clone, Debug)]
pub struct HandposeOutput {
    pub landmarks: Vec<Landmark>,
    pub confidence: f32,
}

/// How a frame was fitted into a square model input.
#[derive(Clone, Copy, Debug)]
pub(super) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Square, rotated window of the frame the landmark model looks at, in frame
/// pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct HandCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
}

impl HandCrop {
    /// Maps a point of an `output_size` square crop back to frame pixels.
    fn to_frame(&self, x: f32, y: f32, output_size: u32) -> (f32, f32) {
        let half = output_size as f32 / 2.0;
        let scale = self.side / output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }
}

pub struct HandposeEngine {
    handpose: Session,
    palm: PalmDetector,
}

impl HandposeEngine {
    pub fn new(handpose_model: &Path, palm_model: &Path) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_model)
            .with_context(|| {
                format!("failed to load ORT session from {}", handpose_model.display())
            })?;
        let palm = PalmDetector::new(palm_model)?;

        Ok(Self { handpose, palm })
    }

    /// `Ok(None)` when the palm detector sees no hand.
    pub fn infer(&mut self, frame: &Frame) -> Result<Option<HandposeOutput>> {
        let regions = self.palm.detect(frame)?;
        let Some(primary) = regions.first() else {
            return Ok(None);
        };
        let crop = crop_around(primary);

        let input = rotated_crop(frame, &crop, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run handpose model")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = decode_landmarks(&flattened, &crop, frame.width, frame.height)?;

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        Ok(Some(HandposeOutput {
            landmarks,
            confidence: (confidence * primary.score).clamp(0.0, 1.0),
        }))
    }
}

/// Letterboxes the frame into a `size` square, keeping the aspect ratio, and
/// scales pixels to `[0, 1]` in NHWC order.
pub(super) fn letterbox_frame(frame: &Frame, size: u32) -> Result<(Array4<f32>, Letterbox)> {
    let Some(img) = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()) else {
        return Err(anyhow!(
            "frame buffer size mismatch: {} bytes for {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        ));
    };

    let scale = size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);

    let pad_x = (size.saturating_sub(new_w) / 2) as i64;
    let pad_y = (size.saturating_sub(new_h) / 2) as i64;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([0, 0, 0]));
    image::imageops::overlay(&mut canvas, &resized, pad_x, pad_y);

    let side = size as usize;
    let mut input = Array4::<f32>::zeros((1, side, side, 3));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            input[[0, y as usize, x as usize, c]] = pixel.0[c] as f32 / 255.0;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

/// Samples a rotated square crop bilinearly into an `output_size` NHWC
/// tensor. Pixels outside the frame are black.
fn rotated_crop(frame: &Frame, crop: &HandCrop, output_size: u32) -> Result<Array4<f32>> {
    let expected = (frame.width as usize) * (frame.height as usize) * 3;
    if frame.rgb.len() != expected {
        return Err(anyhow!(
            "frame buffer size mismatch: {} bytes for {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        ));
    }

    let side = output_size as usize;
    let mut input = Array4::<f32>::zeros((1, side, side, 3));
    for y in 0..side {
        for x in 0..side {
            let (sx, sy) = crop.to_frame(x as f32 + 0.5, y as f32 + 0.5, output_size);
            let rgb = sample_rgb(frame, sx - 0.5, sy - 0.5);
            for c in 0..3 {
                input[[0, y, x, c]] = rgb[c];
            }
        }
    }
    Ok(input)
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= w || py >= h {
            return [0.0; 3];
        }
        let idx = ((py * w + px) as usize) * 3;
        [
            frame.rgb[idx] as f32 / 255.0,
            frame.rgb[idx + 1] as f32 / 255.0,
            frame.rgb[idx + 2] as f32 / 255.0,
        ]
    };

    let x0 = x.floor();
    let y0 = y.floor();
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);
    let c00 = fetch(ix, iy);
    let c10 = fetch(ix + 1, iy);
    let c01 = fetch(ix, iy + 1);
    let c11 = fetch(ix + 1, iy + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| {
        lerp(
            lerp(c00[c], c10[c], fx),
            lerp(c01[c], c11[c], fx),
            fy,
        )
    })
}

/// Maps crop-space `(x, y, z)` triples back to `[0, 1]` image coordinates.
fn decode_landmarks(
    flat: &[f32],
    crop: &HandCrop,
    frame_w: u32,
    frame_h: u32,
) -> Result<Vec<Landmark>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let w = frame_w.max(1) as f32;
    let h = frame_h.max(1) as f32;
    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|p| {
            let (px, py) = crop.to_frame(p[0], p[1], INPUT_SIZE);
            ((px / w).clamp(0.0, 1.0), (py / h).clamp(0.0, 1.0))
        })
        .collect())
}
