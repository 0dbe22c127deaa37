use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// Boxes overlapping a kept box with IoU at or above this are dropped.
    pub iou_threshold: f64,
    /// Lower IoU that still suppresses when the areas are similar.
    pub containment_iou: f64,
    pub containment_area_ratio: f64,
    pub min_side: i32,
    pub min_confidence: f64,
    /// `None` keeps every survivor.
    pub max_detections: Option<usize>,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.35,
            containment_iou: 0.2,
            containment_area_ratio: 0.7,
            min_side: 25,
            min_confidence: 0.4,
            max_detections: Some(8),
        }
    }
}

/// Greedy non-maximum suppression over scored boxes.
#[derive(Clone, Debug, Default)]
pub struct Deduplicator {
    config: NmsConfig,
}

impl Deduplicator {
    pub fn new(config: NmsConfig) -> Self {
        Self { config }
    }

    /// Survivors ordered by confidence, highest first.
    pub fn deduplicate(&self, boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
        let c = &self.config;
        let mut remaining: Vec<BoundingBox> = boxes
            .into_iter()
            .filter(|b| b.width >= c.min_side && b.height >= c.min_side)
            .filter(|b| b.confidence >= c.min_confidence)
            .collect();
        remaining.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<BoundingBox> = Vec::new();
        for candidate in remaining {
            if kept.iter().all(|k| !self.suppresses(k, &candidate)) {
                kept.push(candidate);
            }
        }

        if let Some(max) = c.max_detections {
            kept.truncate(max);
        }
        kept
    }

    fn suppresses(&self, kept: &BoundingBox, other: &BoundingBox) -> bool {
        let iou = kept.iou(other);
        iou >= self.config.iou_threshold
            || (iou > self.config.containment_iou
                && area_ratio(kept, other) > self.config.containment_area_ratio)
    }
}

/// Smaller area over larger area, in [0, 1].
fn area_ratio(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let (aa, ab) = (a.area(), b.area());
    if aa <= 0.0 || ab <= 0.0 {
        return 0.0;
    }
    (aa / ab).min(ab / aa)
}
