use serde::{Deserialize, Serialize};

use super::color::{sample_colors, Rgb};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Coarse appearance class shown next to a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTag {
    /// Gray/silver, low-saturation body typical of tilapia.
    Silver,
    #[default]
    Other,
}

impl std::fmt::Display for ColorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorTag::Silver => write!(f, "silver"),
            ColorTag::Other => write!(f, "other"),
        }
    }
}

const MIN_SILVER_RATIO: f64 = 0.70;
const MAX_MEAN_SATURATION: f64 = 0.25;

fn is_silver(c: &Rgb) -> bool {
    let sat = c.saturation();
    let br = c.brightness();
    (sat < 0.25 && br > 60.0 && br < 160.0)
        || (sat < 0.20 && br > 50.0 && br < 170.0)
        || (c.r > 90 && c.g > 85 && c.b > 80 && c.r < 150 && c.g < 145 && c.b < 140 && sat < 0.22)
}

/// Tags the region under `bbox`, sampling on a stride of `min(w, h) / 15`.
pub fn tag_region(frame: &Frame, bbox: &BoundingBox) -> ColorTag {
    let step = (bbox.min_side().max(0) as usize / 15).max(2);
    let samples = sample_colors(frame, bbox, step);
    if samples.is_empty() {
        return ColorTag::Other;
    }

    let n = samples.len() as f64;
    let silver = samples.iter().filter(|c| is_silver(c)).count() as f64 / n;
    let mean_sat = samples.iter().map(Rgb::saturation).sum::<f64>() / n;
    let mean_br = samples.iter().map(Rgb::brightness).sum::<f64>() / n;

    if silver >= MIN_SILVER_RATIO && mean_sat < MAX_MEAN_SATURATION && (50.0..=170.0).contains(&mean_br) {
        ColorTag::Silver
    } else {
        ColorTag::Other
    }
}
