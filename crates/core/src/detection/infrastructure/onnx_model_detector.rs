use std::path::Path;

use image::imageops::FilterType;

use crate::detection::domain::fish_detector::{DetectionError, FishDetector};
use crate::detection::domain::model_output::NormalizedDetection;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Input resolution used when the model declares a dynamic shape.
const DEFAULT_INPUT_SIZE: u32 = 320;

pub const DEFAULT_MIN_SCORE: f64 = 0.3;

/// Local detection model run through ONNX Runtime.
///
/// Expects an NHWC float input in `0..1` and SSD-style outputs:
/// `boxes [1, N, 4]` (normalized `y1, x1, y2, x2`), `scores [1, N]`, and
/// optionally `num_detections [1]`.
pub struct OnnxModelDetector {
    session: ort::session::Session,
    input_width: u32,
    input_height: u32,
    min_score: f64,
}

impl OnnxModelDetector {
    pub fn new(model_path: &Path, min_score: f64) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| DetectionError::BackendUnavailable(e.to_string()))?;

        // NHWC: [1, H, W, 3]
        let (input_height, input_width) = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() == 4 && shape[1] > 0 && shape[2] > 0 {
                        Some((shape[1] as u32, shape[2] as u32))
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or((DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE));

        log::info!(
            "loaded detection model {} ({}x{} input)",
            model_path.display(),
            input_width,
            input_height
        );

        Ok(Self {
            session,
            input_width,
            input_height,
            min_score,
        })
    }
}

impl FishDetector for OnnxModelDetector {
    fn name(&self) -> &str {
        "onnx-model"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        let input = to_input_tensor(frame, self.input_width, self.input_height)?;
        let value = ort::value::Tensor::from_array(input).map_err(inference)?;
        let outputs = self.session.run(ort::inputs![value]).map_err(inference)?;
        if outputs.len() < 2 {
            return Err(DetectionError::Inference(format!(
                "expected boxes and scores outputs, got {}",
                outputs.len()
            )));
        }

        let boxes = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let scores = outputs[1].try_extract_array::<f32>().map_err(inference)?;
        let boxes = boxes
            .as_slice()
            .ok_or_else(|| DetectionError::Inference("boxes tensor not contiguous".into()))?;
        let scores = scores
            .as_slice()
            .ok_or_else(|| DetectionError::Inference("scores tensor not contiguous".into()))?;

        let mut count = scores.len().min(boxes.len() / 4);
        if outputs.len() > 2 {
            if let Ok(n) = outputs[2].try_extract_array::<f32>() {
                if let Some(&n) = n.as_slice().and_then(|s| s.first()) {
                    count = count.min(n.max(0.0) as usize);
                }
            }
        }

        Ok(decode_detections(
            &boxes[..count * 4],
            &scores[..count],
            self.min_score,
            frame.width(),
            frame.height(),
        ))
    }
}

fn inference(e: ort::Error) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

/// Resizes to the model input and lays out `[1, H, W, 3]` floats in `0..1`.
fn to_input_tensor(frame: &Frame, width: u32, height: u32) -> Result<ndarray::Array4<f32>, DetectionError> {
    let img = frame
        .to_rgb_image()
        .ok_or_else(|| DetectionError::InvalidFrame("buffer does not match dimensions".into()))?;
    let resized = image::imageops::resize(&img, width, height, FilterType::Triangle);
    let data: Vec<f32> = resized.into_raw().iter().map(|&v| v as f32 / 255.0).collect();
    ndarray::Array4::from_shape_vec((1, height as usize, width as usize, 3), data)
        .map_err(|e| DetectionError::Inference(e.to_string()))
}

/// Boxes above `min_score`, mapped into frame pixels.
fn decode_detections(
    boxes: &[f32],
    scores: &[f32],
    min_score: f64,
    frame_w: u32,
    frame_h: u32,
) -> Vec<BoundingBox> {
    boxes
        .chunks_exact(4)
        .zip(scores)
        .filter(|(_, s)| **s as f64 >= min_score)
        .map(|(b, &s)| {
            NormalizedDetection::from_yxyx(
                [b[0] as f64, b[1] as f64, b[2] as f64, b[3] as f64],
                s as f64,
            )
            .to_bounding_box(frame_w, frame_h, frame_w, frame_h)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_tensor_is_nhwc_normalized() {
        let frame = Frame::new(vec![255u8; 40 * 20 * 3], 40, 20, 0, 0);
        let t = to_input_tensor(&frame, 16, 8).unwrap();
        assert_eq!(t.shape(), &[1, 8, 16, 3]);
        assert!((t[[0, 4, 8, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let boxes = [0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0];
        let scores = [0.9, 0.1];
        let out = decode_detections(&boxes, &scores, DEFAULT_MIN_SCORE, 100, 100);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].x, out[0].y, out[0].width, out[0].height), (0, 0, 50, 50));
    }
}
