use crate::shared::bounding_box::BoundingBox;

/// Score assumed when a backend omits one.
pub const DEFAULT_MODEL_SCORE: f64 = 0.5;

/// One model detection with corners normalized to `0..1`, in the
/// `[y1, x1, y2, x2]` order detection models commonly emit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedDetection {
    pub y1: f64,
    pub x1: f64,
    pub y2: f64,
    pub x2: f64,
    pub score: f64,
}

impl NormalizedDetection {
    pub fn from_yxyx(corners: [f64; 4], score: f64) -> Self {
        Self {
            y1: corners[0],
            x1: corners[1],
            y2: corners[2],
            x2: corners[3],
            score,
        }
    }

    /// Maps to pixels of the backend's image (`image_w` x `image_h`), then
    /// to the working frame (`frame_w` x `frame_h`), clamped to it.
    pub fn to_bounding_box(&self, image_w: u32, image_h: u32, frame_w: u32, frame_h: u32) -> BoundingBox {
        let iw = image_w.max(1) as f64;
        let ih = image_h.max(1) as f64;
        let in_image = BoundingBox::new(
            (self.x1 * iw).round() as i32,
            (self.y1 * ih).round() as i32,
            ((self.x2 - self.x1) * iw).round() as i32,
            ((self.y2 - self.y1) * ih).round() as i32,
            self.score.clamp(0.0, 1.0),
        );
        in_image
            .scaled(frame_w as f64 / iw, frame_h as f64 / ih)
            .clamped(frame_w, frame_h)
    }
}
