use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One RGB sample with the derived measures the color heuristics use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn max(&self) -> u8 {
        self.r.max(self.g).max(self.b)
    }

    pub fn min(&self) -> u8 {
        self.r.min(self.g).min(self.b)
    }

    /// HSV saturation in [0, 1].
    pub fn saturation(&self) -> f64 {
        let max = self.max();
        if max == 0 {
            0.0
        } else {
            (max - self.min()) as f64 / max as f64
        }
    }

    /// Mean of the three channels.
    pub fn brightness(&self) -> f64 {
        (self.r as f64 + self.g as f64 + self.b as f64) / 3.0
    }

    /// Spread between the strongest and weakest channel.
    pub fn range(&self) -> u8 {
        self.max() - self.min()
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(px: [u8; 3]) -> Self {
        Self::new(px[0], px[1], px[2])
    }
}

/// Grid positions inside `bbox` on a `step` stride, clipped to the frame.
pub fn sample_grid(
    bbox: &BoundingBox,
    step: usize,
    width: usize,
    height: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let step = step.max(1);
    let x0 = bbox.x.max(0) as usize;
    let y0 = bbox.y.max(0) as usize;
    let x1 = ((bbox.x + bbox.width).max(0) as usize).min(width);
    let y1 = ((bbox.y + bbox.height).max(0) as usize).min(height);
    (y0..y1)
        .step_by(step)
        .flat_map(move |y| (x0..x1).step_by(step).map(move |x| (x, y)))
}

/// RGB samples inside `bbox` on a `step` stride.
pub fn sample_colors(frame: &Frame, bbox: &BoundingBox, step: usize) -> Vec<Rgb> {
    sample_grid(bbox, step, frame.width() as usize, frame.height() as usize)
        .map(|(x, y)| Rgb::from(frame.pixel(x, y)))
        .collect()
}
