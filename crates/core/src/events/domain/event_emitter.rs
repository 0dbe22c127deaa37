use serde::{Deserialize, Serialize};

use super::detection_event::{DetectionEvent, EventKey, HarvestWarning};
use super::event_sink::{DetectionSink, NotificationSink};
use crate::tracking::domain::track::RankedTrack;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// An unchanged non-top-tier detection is re-persisted after this long.
    pub persist_change_interval_ms: u64,
    /// Minimum gap between top-tier persists, changed or not.
    pub top_tier_persist_cooldown_ms: u64,
    /// How far the top-tier cooldown is wound back after a failed persist.
    pub top_tier_retry_rollback_ms: u64,
    pub notification_cooldown_ms: u64,
    pub harvest_warning_interval_ms: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            persist_change_interval_ms: 5_000,
            top_tier_persist_cooldown_ms: 10_000,
            top_tier_retry_rollback_ms: 10_000,
            notification_cooldown_ms: 120_000,
            harvest_warning_interval_ms: 60_000,
        }
    }
}

/// What happened to this cycle's best detection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmitOutcome {
    pub persisted: Option<DetectionEvent>,
    pub notified: bool,
}

/// Decides which detections reach the persistence and notification sinks.
///
/// Each cycle only the most confident classified track is considered.
/// Sink failures are logged and never propagated.
pub struct EventEmitter {
    config: EmitterConfig,
    last_key: Option<EventKey>,
    last_persist_ms: Option<u64>,
    last_top_tier_persist_ms: Option<u64>,
    last_notification_ms: Option<u64>,
    last_harvest_log_ms: Option<u64>,
}

impl EventEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            last_key: None,
            last_persist_ms: None,
            last_top_tier_persist_ms: None,
            last_notification_ms: None,
            last_harvest_log_ms: None,
        }
    }

    pub fn emit(
        &mut self,
        tracks: &[RankedTrack],
        top_tier: &str,
        now_ms: u64,
        detections: &mut dyn DetectionSink,
        notifications: &mut dyn NotificationSink,
    ) -> EmitOutcome {
        let Some(event) = best_event(tracks, now_ms) else {
            return EmitOutcome::default();
        };
        let is_top_tier = event.category == top_tier;
        if !self.should_persist(&event, is_top_tier, now_ms) {
            return EmitOutcome::default();
        }

        self.last_key = Some(event.key());
        self.last_persist_ms = Some(now_ms);
        if is_top_tier {
            self.last_top_tier_persist_ms = Some(now_ms);
        }

        if let Err(e) = detections.persist(&event) {
            log::warn!("Failed to persist {} detection: {e}", event.category);
            if is_top_tier {
                let rollback = self.config.top_tier_retry_rollback_ms;
                self.last_top_tier_persist_ms = Some(now_ms.saturating_sub(rollback));
            }
            return EmitOutcome::default();
        }
        log::debug!(
            "Persisted {} detection {:.2}x{:.2}cm",
            event.category,
            event.length_cm,
            event.width_cm
        );

        let notified = is_top_tier && self.try_notify(&event, now_ms, notifications);
        EmitOutcome {
            persisted: Some(event),
            notified,
        }
    }

    fn should_persist(&self, event: &DetectionEvent, is_top_tier: bool, now_ms: u64) -> bool {
        if is_top_tier {
            return self.last_top_tier_persist_ms.map_or(true, |last| {
                now_ms.saturating_sub(last) >= self.config.top_tier_persist_cooldown_ms
            });
        }
        let changed = self.last_key.as_ref() != Some(&event.key());
        let stale = self.last_persist_ms.map_or(true, |last| {
            now_ms.saturating_sub(last) > self.config.persist_change_interval_ms
        });
        changed || stale
    }

    fn try_notify(
        &mut self,
        event: &DetectionEvent,
        now_ms: u64,
        notifications: &mut dyn NotificationSink,
    ) -> bool {
        let cooled = self.last_notification_ms.map_or(true, |last| {
            now_ms.saturating_sub(last) >= self.config.notification_cooldown_ms
        });
        if !cooled {
            return false;
        }
        match notifications.notify(&alert_message(event), event) {
            Ok(()) => {
                self.last_notification_ms = Some(now_ms);
                true
            }
            Err(e) => {
                log::warn!("Failed to send {} notification: {e}", event.category);
                false
            }
        }
    }

    /// Top-tier tracks this cycle. A summary is logged at most once per
    /// `harvest_warning_interval_ms`; the list itself is always returned.
    pub fn harvest_warnings(
        &mut self,
        tracks: &[RankedTrack],
        top_tier: &str,
        now_ms: u64,
    ) -> Vec<HarvestWarning> {
        let warnings: Vec<HarvestWarning> = tracks
            .iter()
            .filter(|r| r.track.category.as_deref() == Some(top_tier))
            .map(|r| HarvestWarning {
                rank: r.rank,
                length_cm: r.track.length_cm,
                width_cm: r.track.width_cm,
                timestamp_ms: now_ms,
            })
            .collect();

        if !warnings.is_empty() {
            let due = self.last_harvest_log_ms.map_or(true, |last| {
                now_ms.saturating_sub(last) > self.config.harvest_warning_interval_ms
            });
            if due {
                self.last_harvest_log_ms = Some(now_ms);
                let summary: Vec<String> = warnings
                    .iter()
                    .map(|w| format!("Fish {}: {:.2}cm x {:.2}cm", w.rank, w.length_cm, w.width_cm))
                    .collect();
                log::warn!("Ready for harvest: {}", summary.join(", "));
            }
        }
        warnings
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(EmitterConfig::default())
    }
}

fn best_event(tracks: &[RankedTrack], now_ms: u64) -> Option<DetectionEvent> {
    tracks
        .iter()
        .filter(|r| r.track.category.is_some())
        .max_by(|a, b| {
            a.track
                .confidence
                .partial_cmp(&b.track.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .and_then(|r| DetectionEvent::from_track(r, now_ms))
}

pub fn alert_message(event: &DetectionEvent) -> String {
    format!(
        "FishWatch alert: a {} fish has been detected and is ready for harvest. \
         Size: {:.1}cm length x {:.1}cm width.",
        event.category.to_lowercase(),
        event.length_cm,
        event.width_cm
    )
}
