use crate::detection::domain::color_tagger::ColorTag;
use crate::shared::bounding_box::BoundingBox;

/// Persistent identity of one fish across frames.
///
/// `age` counts every cycle since creation, matched or not; it measures
/// lifetime, not time unseen.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub confidence: f64,
    pub age: u32,
    pub last_seen_ms: u64,
    pub length_cm: f64,
    pub width_cm: f64,
    /// Size tier name, assigned by the classifier after each update.
    pub category: Option<String>,
    pub color_tag: ColorTag,
}

impl Track {
    pub fn rect(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A live track with its display rank for this cycle (1 = most confident).
/// Ranks are for labelling only and change between cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedTrack {
    pub rank: usize,
    pub track: Track,
}

/// One deduplicated detection handed to the tracker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub bbox: BoundingBox,
    pub color_tag: ColorTag,
}

impl Observation {
    pub fn new(bbox: BoundingBox, color_tag: ColorTag) -> Self {
        Self { bbox, color_tag }
    }
}
