use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    /// Unreachable service, timeout, or model not loaded. Callers fall back
    /// to another backend rather than retrying.
    #[error("detection backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to encode frame: {0}")]
    Encode(#[source] image::ImageError),
}

/// Domain interface for fish detection backends.
///
/// Returned boxes are in the pixel space of `frame`. Implementations may
/// keep state between calls (e.g. the previous frame for motion), hence
/// `&mut self`.
pub trait FishDetector: Send {
    fn name(&self) -> &str;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError>;
}
