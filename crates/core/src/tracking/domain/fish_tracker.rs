use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::track::{Observation, RankedTrack, Track};
use crate::shared::bounding_box::{center_distance, rect_iou};
use crate::shared::constants::DEFAULT_PIXEL_TO_CM;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Association requires IoU strictly above this.
    pub iou_floor: f64,
    /// Association requires center distance below `max(w, h) * this`.
    pub distance_multiplier: f64,
    /// Weight kept by the old box on a match.
    pub smoothing: f64,
    /// Weight kept by the old velocity on a match.
    pub velocity_blend: f64,
    /// Weight given to a new physical measurement.
    pub measurement_blend: f64,
    pub confidence_decay: f64,
    pub velocity_decay: f64,
    /// Unmatched tracks older than this many cycles are dropped.
    pub max_track_age: u32,
    /// Tracks at or below this confidence are not reported.
    pub output_confidence_floor: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_floor: 0.3,
            distance_multiplier: 1.5,
            smoothing: 0.7,
            velocity_blend: 0.7,
            measurement_blend: 0.3,
            confidence_decay: 0.95,
            velocity_decay: 0.85,
            max_track_age: 15,
            output_confidence_floor: 0.3,
        }
    }
}

/// Greedy IoU + distance-gated multi-object tracker.
///
/// Owns the only copy of the track map; it must be driven from a single
/// thread, one `update` per processing cycle.
pub struct FishTracker {
    tracks: BTreeMap<u32, Track>,
    next_id: u32,
    config: TrackerConfig,
    pixel_to_cm: f64,
}

impl FishTracker {
    pub fn new(config: TrackerConfig, pixel_to_cm: f64) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            config,
            pixel_to_cm,
        }
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.values_mut()
    }

    /// Drops every track. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Runs one cycle: associate, update matched, create new, decay the rest.
    pub fn update(&mut self, observations: &[Observation], now_ms: u64) -> Vec<RankedTrack> {
        let matches = self.associate(observations);
        let mut touched = HashSet::new();

        for (obs, matched) in observations.iter().zip(&matches) {
            let id = match matched {
                Some(id) => {
                    self.apply_match(*id, obs, now_ms);
                    *id
                }
                None => self.create_track(obs, now_ms),
            };
            touched.insert(id);
        }

        self.decay_unmatched(&touched);
        self.live_tracks()
    }

    /// Live tracks above the confidence floor, most confident first.
    pub fn live_tracks(&self) -> Vec<RankedTrack> {
        let mut live: Vec<&Track> = self
            .tracks
            .values()
            .filter(|t| t.confidence > self.config.output_confidence_floor)
            .collect();
        live.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        live.into_iter()
            .enumerate()
            .map(|(i, t)| RankedTrack {
                rank: i + 1,
                track: t.clone(),
            })
            .collect()
    }

    /// For each observation in order, the best unused track passing both
    /// gates. Ties keep the earlier (lower id) track.
    fn associate(&self, observations: &[Observation]) -> Vec<Option<u32>> {
        let mut used = HashSet::new();
        observations
            .iter()
            .map(|obs| {
                let det = obs.bbox.as_rect();
                let mut best: Option<(u32, f64)> = None;
                for (id, track) in &self.tracks {
                    if used.contains(id) {
                        continue;
                    }
                    let rect = track.rect();
                    let iou = rect_iou(&det, &rect);
                    let max_dist = track.width.max(track.height) * self.config.distance_multiplier;
                    if iou > self.config.iou_floor
                        && center_distance(&det, &rect) < max_dist
                        && best.map_or(true, |(_, b)| iou > b)
                    {
                        best = Some((*id, iou));
                    }
                }
                best.map(|(id, _)| {
                    used.insert(id);
                    id
                })
            })
            .collect()
    }

    fn measure(&self, obs: &Observation) -> (f64, f64) {
        (
            obs.bbox.max_side() as f64 * self.pixel_to_cm,
            obs.bbox.min_side() as f64 * self.pixel_to_cm,
        )
    }

    fn apply_match(&mut self, id: u32, obs: &Observation, now_ms: u64) {
        let (length, width) = self.measure(obs);
        let c = &self.config;
        let Some(t) = self.tracks.get_mut(&id) else {
            return;
        };
        let gain = 1.0 - c.smoothing;
        let [dx, dy, dw, dh] = obs.bbox.as_rect();

        let step_x = (dx - t.x) * gain;
        let step_y = (dy - t.y) * gain;
        t.velocity_x = t.velocity_x * c.velocity_blend + step_x * (1.0 - c.velocity_blend);
        t.velocity_y = t.velocity_y * c.velocity_blend + step_y * (1.0 - c.velocity_blend);
        t.x += step_x;
        t.y += step_y;
        t.width += (dw - t.width) * gain;
        t.height += (dh - t.height) * gain;
        t.confidence = (t.confidence * c.confidence_decay).max(obs.bbox.confidence);
        t.age += 1;
        t.last_seen_ms = now_ms;
        t.length_cm += (length - t.length_cm) * c.measurement_blend;
        t.width_cm += (width - t.width_cm) * c.measurement_blend;
    }

    fn create_track(&mut self, obs: &Observation, now_ms: u64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let (length, width) = self.measure(obs);
        let [x, y, w, h] = obs.bbox.as_rect();
        self.tracks.insert(
            id,
            Track {
                id,
                x,
                y,
                width: w,
                height: h,
                velocity_x: 0.0,
                velocity_y: 0.0,
                confidence: obs.bbox.confidence,
                age: 0,
                last_seen_ms: now_ms,
                length_cm: round2(length),
                width_cm: round2(width),
                category: None,
                color_tag: obs.color_tag,
            },
        );
        log::debug!("new track {id} at ({x}, {y}) {w}x{h}");
        id
    }

    /// Predicts lost tracks forward and removes the ones past max age.
    fn decay_unmatched(&mut self, touched: &HashSet<u32>) {
        let c = &self.config;
        self.tracks.retain(|id, t| {
            if touched.contains(id) {
                return true;
            }
            t.age += 1;
            if t.age > c.max_track_age {
                log::debug!("track {id} expired at age {}", t.age);
                return false;
            }
            t.x += t.velocity_x;
            t.y += t.velocity_y;
            t.confidence *= c.confidence_decay;
            t.velocity_x *= c.velocity_decay;
            t.velocity_y *= c.velocity_decay;
            true
        });
    }
}

impl Default for FishTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default(), DEFAULT_PIXEL_TO_CM)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::color_tagger::ColorTag;
    use crate::shared::bounding_box::BoundingBox;
    use approx::assert_relative_eq;

    fn obs(x: i32, y: i32, w: i32, h: i32, conf: f64) -> Observation {
        Observation::new(BoundingBox::new(x, y, w, h, conf), ColorTag::Other)
    }

    // ── Identity ─────────────────────────────────────────────────────

    #[test]
    fn test_new_detections_get_unique_increasing_ids() {
        let mut tracker = FishTracker::default();
        let live = tracker.update(&[obs(0, 0, 100, 40, 0.9), obs(200, 150, 100, 40, 0.8)], 0);
        assert_eq!(live.len(), 2);
        let mut ids: Vec<u32> = live.iter().map(|r| r.track.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_stationary_detection_keeps_one_stable_id() {
        let mut tracker = FishTracker::default();
        let mut first_id = None;
        for cycle in 0..10 {
            let live = tracker.update(&[obs(50, 50, 120, 40, 0.85)], cycle * 100);
            assert_eq!(live.len(), 1);
            let id = live[0].track.id;
            assert_eq!(*first_id.get_or_insert(id), id);
        }
        assert_eq!(tracker.tracks.len(), 1);
    }

    #[test]
    fn test_slowly_moving_detection_is_followed() {
        let mut tracker = FishTracker::default();
        for i in 0..12 {
            tracker.update(&[obs(50 + i * 4, 60, 120, 40, 0.85)], 0);
        }
        assert_eq!(tracker.tracks.len(), 1);
        assert_eq!(tracker.live_tracks()[0].track.id, 1);
    }

    #[test]
    fn test_far_detection_creates_new_track() {
        let mut tracker = FishTracker::default();
        tracker.update(&[obs(0, 0, 100, 40, 0.9)], 0);
        tracker.update(&[obs(400, 300, 100, 40, 0.9)], 0);
        assert_eq!(tracker.tracks.len(), 2);
    }

    #[test]
    fn test_track_is_used_at_most_once_per_cycle() {
        let mut tracker = FishTracker::default();
        tracker.update(&[obs(0, 0, 100, 40, 0.9)], 0);
        tracker.update(&[obs(2, 0, 100, 40, 0.9), obs(4, 0, 100, 40, 0.8)], 0);
        assert_eq!(tracker.tracks.len(), 2);
        assert!(tracker.tracks.get(&1).is_some());
        assert!(tracker.tracks.get(&2).is_some());
    }

    // ── Expiry ───────────────────────────────────────────────────────

    #[test]
    fn test_lost_track_expires_and_reappearance_gets_new_id() {
        let config = TrackerConfig::default();
        let max_age = config.max_track_age;
        let mut tracker = FishTracker::new(config, DEFAULT_PIXEL_TO_CM);
        tracker.update(&[obs(50, 50, 120, 40, 0.95)], 0);

        for _ in 0..max_age {
            tracker.update(&[], 0);
        }
        assert_eq!(tracker.tracks.len(), 1, "still alive at age == max");
        tracker.update(&[], 0);
        assert!(tracker.tracks.is_empty());

        let live = tracker.update(&[obs(50, 50, 120, 40, 0.95)], 0);
        assert_eq!(live.len(), 1);
        assert!(live[0].track.id > 1);
    }

    #[test]
    fn test_age_counts_lifetime_not_time_unseen() {
        let mut tracker = FishTracker::default();
        for _ in 0..5 {
            tracker.update(&[obs(50, 50, 120, 40, 0.9)], 0);
        }
        assert_eq!(tracker.tracks.get(&1).unwrap().age, 4);
        tracker.update(&[], 0);
        assert_eq!(tracker.tracks.get(&1).unwrap().age, 5);
    }

    #[test]
    fn test_old_track_is_dropped_on_first_miss() {
        let mut tracker = FishTracker::default();
        for _ in 0..20 {
            tracker.update(&[obs(50, 50, 120, 40, 0.9)], 0);
        }
        assert_eq!(tracker.tracks.len(), 1);
        tracker.update(&[], 0);
        assert!(tracker.tracks.is_empty());
    }

    // ── Smoothing ────────────────────────────────────────────────────

    #[test]
    fn test_matched_update_smooths_toward_detection() {
        let mut tracker = FishTracker::default();
        tracker.update(&[obs(100, 100, 100, 40, 0.9)], 0);
        tracker.update(&[obs(110, 100, 100, 40, 0.6)], 250);

        let t = tracker.tracks.get(&1).unwrap();
        assert_relative_eq!(t.x, 103.0);
        assert_relative_eq!(t.velocity_x, 0.9);
        assert_relative_eq!(t.confidence, 0.855);
        assert_eq!(t.last_seen_ms, 250);
        assert_eq!(t.age, 1);
    }

    #[test]
    fn test_measurements_use_pixel_scale_and_blend() {
        let mut tracker = FishTracker::default();
        tracker.update(&[obs(0, 0, 100, 40, 0.9)], 0);
        let t = tracker.tracks.get(&1).unwrap();
        assert_relative_eq!(t.length_cm, 8.0);
        assert_relative_eq!(t.width_cm, 3.2);

        tracker.update(&[obs(0, 0, 110, 40, 0.9)], 0);
        let t = tracker.tracks.get(&1).unwrap();
        assert_relative_eq!(t.length_cm, 8.0 + (8.8 - 8.0) * 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_unmatched_track_is_predicted_forward() {
        let mut tracker = FishTracker::default();
        tracker.update(&[obs(100, 100, 100, 40, 0.9)], 0);
        tracker.update(&[obs(110, 100, 100, 40, 0.9)], 0);
        let before = tracker.tracks.get(&1).unwrap().clone();

        tracker.update(&[], 0);
        let after = tracker.tracks.get(&1).unwrap();
        assert_relative_eq!(after.x, before.x + before.velocity_x);
        assert_relative_eq!(after.velocity_x, before.velocity_x * 0.85);
        assert_relative_eq!(after.confidence, before.confidence * 0.95);
    }

    // ── Output ───────────────────────────────────────────────────────

    #[test]
    fn test_output_sorted_by_confidence_with_ranks() {
        let mut tracker = FishTracker::default();
        let live = tracker.update(
            &[
                obs(0, 0, 100, 40, 0.5),
                obs(200, 0, 100, 40, 0.9),
                obs(0, 200, 100, 40, 0.7),
            ],
            0,
        );
        let confs: Vec<f64> = live.iter().map(|r| r.track.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.7, 0.5]);
        let ranks: Vec<usize> = live.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_low_confidence_tracks_are_hidden_but_kept() {
        let mut tracker = FishTracker::default();
        let live = tracker.update(&[obs(0, 0, 100, 40, 0.25)], 0);
        assert!(live.is_empty());
        assert_eq!(tracker.tracks.len(), 1);
    }

    #[test]
    fn test_new_track_keeps_color_tag() {
        let mut tracker = FishTracker::default();
        let silver = Observation::new(BoundingBox::new(0, 0, 100, 40, 0.9), ColorTag::Silver);
        tracker.update(&[silver], 0);
        tracker.update(&[obs(1, 0, 100, 40, 0.9)], 0);
        assert_eq!(tracker.tracks.get(&1).unwrap().color_tag, ColorTag::Silver);
    }
}
