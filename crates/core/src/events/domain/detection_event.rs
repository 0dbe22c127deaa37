use serde::{Deserialize, Serialize};

use crate::detection::domain::color_tagger::ColorTag;
use crate::tracking::domain::track::RankedTrack;

/// A classified fish sighting handed to persistence and notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub length_cm: f64,
    pub width_cm: f64,
    pub category: String,
    pub confidence_percent: f64,
    pub timestamp_ms: u64,
}

impl DetectionEvent {
    /// Builds an event from a classified track. Measurements are rounded to
    /// 2 decimals, confidence to 1 decimal percent. Unclassified tracks
    /// produce nothing.
    pub fn from_track(ranked: &RankedTrack, now_ms: u64) -> Option<Self> {
        let track = &ranked.track;
        let category = track.category.clone()?;
        Some(Self {
            length_cm: round_to(track.length_cm, 2),
            width_cm: round_to(track.width_cm, 2),
            category,
            confidence_percent: round_to(track.confidence * 100.0, 1),
            timestamp_ms: now_ms,
        })
    }

    /// Identity used to decide whether a detection is "the same" as the
    /// last persisted one: measurements in hundredths plus the category.
    pub fn key(&self) -> EventKey {
        EventKey {
            length_hundredths: (self.length_cm * 100.0).round() as i64,
            width_hundredths: (self.width_cm * 100.0).round() as i64,
            category: self.category.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    length_hundredths: i64,
    width_hundredths: i64,
    category: String,
}

/// One box to draw on the rendered frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayItem {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    pub color_tag: ColorTag,
}

impl OverlayItem {
    pub fn from_track(ranked: &RankedTrack) -> Self {
        let t = &ranked.track;
        Self {
            x: t.x,
            y: t.y,
            width: t.width,
            height: t.height,
            label: format!("Fish {} {:.1}%", ranked.rank, t.confidence * 100.0),
            color_tag: t.color_tag,
        }
    }
}

/// A live track in the top size tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestWarning {
    pub rank: usize,
    pub length_cm: f64,
    pub width_cm: f64,
    pub timestamp_ms: u64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
