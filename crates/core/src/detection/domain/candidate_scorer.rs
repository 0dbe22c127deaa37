use serde::{Deserialize, Serialize};

use super::color::{sample_grid, Rgb};
use super::preprocessor::{EdgeMap, GrayFrame};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Relative weight of each sub-score. The defaults sum to 0.9, so a
/// candidate needs broad support to clear the acceptance threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub shape: f64,
    pub color: f64,
    pub aspect: f64,
    pub size: f64,
    pub edge: f64,
    pub motion: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            shape: 0.15,
            color: 0.20,
            aspect: 0.20,
            size: 0.12,
            edge: 0.08,
            motion: 0.15,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub acceptance_threshold: f64,
    pub confidence_cap: f64,
    pub weights: ScoreWeights,
    /// Grayscale delta above which a pixel counts as moving.
    pub motion_threshold: u8,
    pub min_sample_step: usize,
    pub sample_divisor: usize,
    pub perimeter_samples: usize,
    /// Grayscale contrast against the perimeter that marks body pixels.
    pub foreground_contrast: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.68,
            confidence_cap: 0.98,
            weights: ScoreWeights::default(),
            motion_threshold: 15,
            min_sample_step: 2,
            sample_divisor: 25,
            perimeter_samples: 24,
            foreground_contrast: 20.0,
        }
    }
}

/// Individual sub-scores in [0, 1] and their weighted total.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub shape: f64,
    pub color: f64,
    pub aspect: f64,
    pub size: f64,
    pub edge: f64,
    pub motion: f64,
    pub total: f64,
}

/// Explainable fish-likelihood score for a candidate box.
#[derive(Clone, Debug, Default)]
pub struct CandidateScorer {
    config: ScorerConfig,
}

impl CandidateScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Returns the box with its score as confidence, or `None` when the
    /// score does not clear the acceptance threshold.
    pub fn accept(
        &self,
        frame: &Frame,
        edges: &EdgeMap,
        bbox: &BoundingBox,
        previous: Option<&GrayFrame>,
    ) -> Option<BoundingBox> {
        let breakdown = self.score(frame, edges, bbox, previous);
        if breakdown.total > self.config.acceptance_threshold {
            Some(BoundingBox {
                confidence: breakdown.total.min(self.config.confidence_cap),
                ..*bbox
            })
        } else {
            None
        }
    }

    pub fn score(
        &self,
        frame: &Frame,
        edges: &EdgeMap,
        bbox: &BoundingBox,
        previous: Option<&GrayFrame>,
    ) -> ScoreBreakdown {
        let (w, h) = (edges.width(), edges.height());
        let step = self.sample_step(bbox);
        let points: Vec<(usize, usize)> = sample_grid(bbox, step, w, h).collect();
        if points.is_empty() {
            return ScoreBreakdown::default();
        }

        let perimeter = self.perimeter_grays(edges, bbox);
        let colors: Vec<Rgb> = points
            .iter()
            .map(|&(x, y)| Rgb::from(frame.pixel(x, y)))
            .collect();

        let weights = &self.config.weights;
        let mut b = ScoreBreakdown {
            shape: shape_score(self.density_ratio(edges, bbox, &points, &perimeter)),
            color: color_score(&colors),
            aspect: aspect_score(bbox.elongation()),
            size: size_score(bbox.area(), bbox.min_side(), bbox.max_side()),
            edge: edge_smoothness_score(&perimeter),
            motion: match previous {
                Some(prev) if prev.width == w && prev.height == h => {
                    motion_score(self.motion_ratio(edges, prev, bbox, step))
                }
                _ => NEUTRAL_MOTION,
            },
            total: 0.0,
        };
        b.total = (b.shape * weights.shape
            + b.color * weights.color
            + b.aspect * weights.aspect
            + b.size * weights.size
            + b.edge * weights.edge
            + b.motion * weights.motion)
            .min(self.config.confidence_cap);
        b
    }

    fn sample_step(&self, bbox: &BoundingBox) -> usize {
        (bbox.min_side().max(0) as usize / self.config.sample_divisor.max(1))
            .max(self.config.min_sample_step)
    }

    /// Grayscale values at evenly spaced positions along the box outline.
    fn perimeter_grays(&self, edges: &EdgeMap, bbox: &BoundingBox) -> Vec<f64> {
        let n = self.config.perimeter_samples;
        let bw = bbox.width.max(1) as f64;
        let bh = bbox.height.max(1) as f64;
        let total = 2.0 * (bw + bh);
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let d = total * i as f64 / n as f64;
            let (px, py) = if d < bw {
                (d, 0.0)
            } else if d < bw + bh {
                (bw - 1.0, d - bw)
            } else if d < 2.0 * bw + bh {
                (bw - 1.0 - (d - bw - bh), bh - 1.0)
            } else {
                (0.0, bh - 1.0 - (d - 2.0 * bw - bh))
            };
            let x = (bbox.x as f64 + px.max(0.0)).floor();
            let y = (bbox.y as f64 + py.max(0.0)).floor();
            if x >= 0.0 && y >= 0.0 && (x as usize) < edges.width() && (y as usize) < edges.height()
            {
                out.push(edges.gray_at(x as usize, y as usize) as f64);
            }
        }
        out
    }

    /// How much more of the central ellipse than of the outer band stands
    /// out from the perimeter's background level.
    fn density_ratio(
        &self,
        edges: &EdgeMap,
        bbox: &BoundingBox,
        points: &[(usize, usize)],
        perimeter: &[f64],
    ) -> f64 {
        if perimeter.is_empty() {
            return 0.0;
        }
        let background = perimeter.iter().sum::<f64>() / perimeter.len() as f64;
        let (cx, cy) = bbox.center();
        let rx = (bbox.width as f64 * 0.35).max(1.0);
        let ry = (bbox.height as f64 * 0.35).max(1.0);

        let (mut center_fg, mut center_n, mut band_fg, mut band_n) = (0usize, 0usize, 0usize, 0usize);
        for &(x, y) in points {
            let fg = (edges.gray_at(x, y) as f64 - background).abs() > self.config.foreground_contrast;
            let nx = (x as f64 - cx) / rx;
            let ny = (y as f64 - cy) / ry;
            if nx * nx + ny * ny < 1.0 {
                center_n += 1;
                center_fg += fg as usize;
            } else {
                band_n += 1;
                band_fg += fg as usize;
            }
        }
        if center_n == 0 {
            return 0.0;
        }
        let center_frac = center_fg as f64 / center_n as f64;
        let band_frac = if band_n == 0 {
            0.0
        } else {
            band_fg as f64 / band_n as f64
        };
        center_frac / band_frac.max(0.05)
    }

    fn motion_ratio(&self, edges: &EdgeMap, prev: &GrayFrame, bbox: &BoundingBox, step: usize) -> f64 {
        let motion_step = ((step as f64 / 1.5).floor() as usize).max(2);
        let mut moving = 0usize;
        let mut total = 0usize;
        for (x, y) in sample_grid(bbox, motion_step, edges.width(), edges.height()) {
            total += 1;
            if edges.gray_at(x, y).abs_diff(prev.at(x, y)) > self.config.motion_threshold {
                moving += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            moving as f64 / total as f64
        }
    }
}

const NEUTRAL_MOTION: f64 = 0.5;

pub fn shape_score(density_ratio: f64) -> f64 {
    match density_ratio {
        r if r > 0.6 => 1.0,
        r if r > 0.4 => 0.85,
        r if r > 0.3 => 0.65,
        r if r > 0.2 => 0.4,
        _ => 0.1,
    }
}

/// Matches any of the aquatic palettes: silver, blue, green-gray, brown,
/// gold, red-orange, dark, or medium tones.
pub fn is_fish_color(c: &Rgb) -> bool {
    let (r, g, b) = (c.r as i32, c.g as i32, c.b as i32);
    let sat = c.saturation();
    let br = c.brightness();

    (sat < 0.25 && br > 40.0 && br < 200.0)
        || (b > r + 20 && b > g + 15 && sat < 0.50 && br < 200.0)
        || (g > r + 15 && g > b + 10 && sat < 0.45 && br < 200.0)
        || (r > 80 && g > 70 && b > 60 && r < 180 && g < 170 && b < 160 && sat < 0.40)
        || (r > 150 && g > 140 && b < 100 && sat < 0.55 && br < 220.0)
        || (r > 120 && g < r - 20 && b < r - 30 && sat < 0.60 && br < 210.0)
        || (br < 80.0 && sat < 0.30)
        || ((80.0..=160.0).contains(&br) && sat < 0.35)
}

/// Fraction of fish-colored samples, penalized for flat, glaring or
/// oversaturated regions.
pub fn color_score(samples: &[Rgb]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mut fish = 0usize;
    let mut uniform = 0usize;
    let mut bright = 0usize;
    let mut underwater = 0usize;
    let mut sat_sum = 0.0;

    for c in samples {
        let sat = c.saturation();
        sat_sum += sat;
        if c.range() < 25 {
            uniform += 1;
        }
        if c.brightness() > 220.0 || sat > 0.6 {
            bright += 1;
        }
        if is_fish_color(c) {
            fish += 1;
        }
        if c.b as i32 > c.g as i32 + 10 || c.g as i32 > c.r as i32 + 10 {
            underwater += 1;
        }
    }

    let raw = fish as f64 / n;
    let uniformity = uniform as f64 / n;
    let bright_ratio = bright as f64 / n;
    let avg_sat = sat_sum / n;
    let underwater_ratio = underwater as f64 / n;

    let mut adjusted = raw;
    if uniformity > 0.6 {
        adjusted *= 0.4;
    } else if uniformity > 0.45 {
        adjusted *= 0.6;
    }
    if bright_ratio > 0.3 {
        adjusted *= 0.3;
    } else if bright_ratio > 0.2 {
        adjusted *= 0.5;
    }
    if avg_sat > 0.5 {
        adjusted *= 0.6;
    } else if avg_sat > 0.4 {
        adjusted *= 0.8;
    }
    if underwater_ratio > 0.3 {
        adjusted = (adjusted * 1.1).min(1.0);
    }
    if raw < 0.55 {
        adjusted *= 0.5;
    } else if raw < 0.65 {
        adjusted *= 0.7;
    }
    adjusted
}

/// Lookup curve peaking on typical fish elongation (2.0 to 4.0).
pub fn aspect_score(ratio: f64) -> f64 {
    if (2.0..=4.0).contains(&ratio) {
        1.0
    } else if (1.8..2.0).contains(&ratio) {
        0.9
    } else if ratio > 4.0 && ratio <= 4.5 {
        0.85
    } else if (1.5..1.8).contains(&ratio) || (ratio > 4.5 && ratio <= 5.0) {
        0.7
    } else if (1.3..1.5).contains(&ratio) {
        0.5
    } else {
        0.2
    }
}

pub fn size_score(area: f64, min_side: i32, max_side: i32) -> f64 {
    if (3000.0..=50000.0).contains(&area) && min_side >= 30 && max_side <= 400 {
        1.0
    } else if (2000.0..3000.0).contains(&area) && min_side >= 25 {
        0.8
    } else if area > 50000.0 && area <= 80000.0 && max_side <= 500 {
        0.8
    } else if min_side < 25 {
        0.2
    } else if area > 80000.0 {
        0.3
    } else {
        0.5
    }
}

/// Scores the grayscale variance along the outline: moderate is fish-like,
/// flat or chaotic is not.
pub fn edge_smoothness_score(perimeter: &[f64]) -> f64 {
    if perimeter.len() <= 5 {
        return 0.0;
    }
    let n = perimeter.len() as f64;
    let mean = perimeter.iter().sum::<f64>() / n;
    let variance = perimeter.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    if variance > 150.0 && variance < 3000.0 {
        1.0
    } else if variance > 100.0 && variance < 4000.0 {
        0.7
    } else if variance > 50.0 && variance < 5000.0 {
        0.4
    } else {
        0.2
    }
}

/// Motion is a bonus only; a still region scores neutral.
pub fn motion_score(ratio: f64) -> f64 {
    match ratio {
        r if r > 0.25 => 1.0,
        r if r > 0.15 => 0.8,
        r if r > 0.08 => 0.6,
        _ => NEUTRAL_MOTION,
    }
}
