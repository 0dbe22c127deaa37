use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;

/// Adaptive edge-threshold parameters. Magnitudes are squared Sobel
/// responses, so the floors are squared too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub edge_floor: u32,
    pub median_factor: f64,
    pub strong_floor: u32,
    pub p75_factor: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            edge_floor: 400,
            median_factor: 0.6,
            strong_floor: 1600,
            p75_factor: 1.2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeThresholds {
    /// Pixels with magnitude strictly above this are edges.
    pub low: u32,
    /// Strong-edge cutoff. Segmentation uses `low` only; this one is
    /// reported as the `strong_edge_threshold` metric.
    pub high: u32,
}

/// Grayscale and squared-gradient buffers for one frame.
#[derive(Clone, Debug)]
pub struct EdgeMap {
    width: usize,
    height: usize,
    gray: Vec<u8>,
    magnitude: Vec<u32>,
    thresholds: EdgeThresholds,
}

impl EdgeMap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn thresholds(&self) -> EdgeThresholds {
        self.thresholds
    }

    #[inline]
    pub fn gray_at(&self, x: usize, y: usize) -> u8 {
        self.gray[y * self.width + x]
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.magnitude[y * self.width + x] > self.thresholds.low
    }

    pub fn edge_count(&self) -> usize {
        self.magnitude
            .iter()
            .filter(|&&m| m > self.thresholds.low)
            .count()
    }

    /// Moves the grayscale buffer out, for motion scoring on the next cycle.
    pub fn into_gray(self) -> GrayFrame {
        GrayFrame {
            width: self.width,
            height: self.height,
            data: self.gray,
        }
    }
}

/// Grayscale copy of a previous frame.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayFrame {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Converts RGB frames into grayscale plus an adaptively thresholded
/// Sobel edge map. Pure: holds configuration only.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, frame: &Frame) -> EdgeMap {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let gray = to_grayscale(frame);
        let magnitude = sobel_squared(&gray, width, height);
        let thresholds = self.thresholds(&magnitude);
        EdgeMap {
            width,
            height,
            gray,
            magnitude,
            thresholds,
        }
    }

    /// Median / 75th-percentile of the nonzero magnitudes, floored.
    pub fn thresholds(&self, magnitude: &[u32]) -> EdgeThresholds {
        let mut nonzero: Vec<u32> = magnitude.iter().copied().filter(|&m| m > 0).collect();
        let (median, p75) = if nonzero.is_empty() {
            (0, 0)
        } else {
            let len = nonzero.len();
            let median = *nonzero.select_nth_unstable(len / 2).1;
            let p75 = *nonzero.select_nth_unstable((len * 3) / 4).1;
            (median, p75)
        };

        let low = (median as f64 * self.config.median_factor).max(self.config.edge_floor as f64);
        let high = (p75 as f64 * self.config.p75_factor).max(self.config.strong_floor as f64);
        EdgeThresholds {
            low: low as u32,
            high: high as u32,
        }
    }
}

/// ITU-R 601 luma, floored.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

pub fn to_grayscale(frame: &Frame) -> Vec<u8> {
    frame
        .data()
        .chunks_exact(3)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect()
}

/// Squared 3x3 Sobel magnitude. Border pixels stay zero.
pub fn sobel_squared(gray: &[u8], width: usize, height: usize) -> Vec<u32> {
    let mut out = vec![0u32; width * height];
    if width < 3 || height < 3 {
        return out;
    }

    let p = |x: usize, y: usize| gray[y * width + x] as i32;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = -p(x - 1, y - 1) + p(x + 1, y - 1) - 2 * p(x - 1, y) + 2 * p(x + 1, y)
                - p(x - 1, y + 1)
                + p(x + 1, y + 1);
            let gy = -p(x - 1, y - 1) - 2 * p(x, y - 1) - p(x + 1, y - 1)
                + p(x - 1, y + 1)
                + 2 * p(x, y + 1)
                + p(x + 1, y + 1);
            out[y * width + x] = (gx * gx + gy * gy) as u32;
        }
    }
    out
}
