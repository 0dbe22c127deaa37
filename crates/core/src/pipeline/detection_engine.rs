use std::time::{Duration, Instant};

use crate::classification::domain::size_classifier::SizeClassifier;
use crate::classification::infrastructure::cached_size_config::CachedSizeConfig;
use crate::detection::domain::color_tagger::tag_region;
use crate::detection::domain::deduplicator::Deduplicator;
use crate::detection::domain::fish_detector::{DetectionError, FishDetector};
use crate::detection::infrastructure::background_detector::{BackgroundDetector, BackgroundResult};
use crate::detection::infrastructure::heuristic_fish_detector::HeuristicFishDetector;
use crate::events::domain::detection_event::{HarvestWarning, OverlayItem};
use crate::events::domain::event_emitter::{EmitOutcome, EventEmitter};
use crate::events::domain::event_sink::{DetectionSink, NotificationSink};
use crate::pipeline::engine_config::EngineConfig;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::SLOW_DETECTION_MS;
use crate::shared::frame::Frame;
use crate::tracking::domain::fish_tracker::FishTracker;
use crate::tracking::domain::track::{Observation, RankedTrack};

/// Optional model backend in front of the built-in heuristic detector.
enum Backend {
    /// Called on the engine's thread.
    Inline(Box<dyn FishDetector>),
    /// Runs on a worker; results are picked up on a later cycle.
    Background(BackgroundDetector),
}

/// Everything one cycle produced.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    /// Whether tracks were updated from fresh detections this cycle.
    pub detection_ran: bool,
    /// Detections that survived deduplication.
    pub detections: usize,
    pub tracks: Vec<RankedTrack>,
    pub overlays: Vec<OverlayItem>,
    pub harvest_warnings: Vec<HarvestWarning>,
    pub emitted: EmitOutcome,
}

/// Owns all per-session detection state: tracker, settings cache, emitter
/// cooldowns and the schedule. Drive it with one [`process`] call per frame.
///
/// [`process`]: DetectionEngine::process
pub struct DetectionEngine {
    config: EngineConfig,
    heuristic: HeuristicFishDetector,
    backend: Option<Backend>,
    deduplicator: Deduplicator,
    tracker: FishTracker,
    classifier: SizeClassifier,
    sizes: CachedSizeConfig,
    emitter: EventEmitter,
    detection_sink: Box<dyn DetectionSink>,
    notification_sink: Box<dyn NotificationSink>,
    cycle: u64,
    last_detection_ms: Option<u64>,
    live: Vec<RankedTrack>,
}

impl DetectionEngine {
    pub fn new(
        config: EngineConfig,
        sizes: CachedSizeConfig,
        detection_sink: Box<dyn DetectionSink>,
        notification_sink: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            heuristic: HeuristicFishDetector::new(
                config.preprocess.clone(),
                config.segmenter.clone(),
                config.scorer.clone(),
            ),
            backend: None,
            deduplicator: Deduplicator::new(config.nms.clone()),
            tracker: FishTracker::new(config.tracker.clone(), config.pixel_to_cm),
            classifier: SizeClassifier::default(),
            sizes,
            emitter: EventEmitter::new(config.emitter.clone()),
            detection_sink,
            notification_sink,
            cycle: 0,
            last_detection_ms: None,
            live: Vec::new(),
            config,
        }
    }

    /// Runs `detector` on the engine's thread in place of the heuristic.
    pub fn with_backend(mut self, detector: Box<dyn FishDetector>) -> Self {
        self.backend = Some(Backend::Inline(detector));
        self
    }

    /// Runs a detector on a worker thread; the previous tracks keep being
    /// reported while a request is in flight.
    pub fn with_background_backend(mut self, detector: BackgroundDetector) -> Self {
        self.backend = Some(Backend::Background(detector));
        self
    }

    /// Name of the detector currently producing boxes.
    pub fn detector_name(&self) -> &str {
        match &self.backend {
            Some(Backend::Inline(d)) => d.name(),
            Some(Backend::Background(d)) => d.name(),
            None => self.heuristic.name(),
        }
    }

    pub fn live_tracks(&self) -> &[RankedTrack] {
        &self.live
    }

    /// Clears tracks and the schedule for a new session and rereads the size
    /// tiers on the next detection. Emitter cooldowns survive so a restart
    /// cannot bypass them.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.sizes.invalidate();
        self.heuristic.reset();
        self.cycle = 0;
        self.last_detection_ms = None;
        self.live.clear();
    }

    /// One cycle: pick up finished background work, detect if due, then
    /// track, classify and emit. Cycles without fresh detections report the
    /// previous tracks unchanged.
    pub fn process(
        &mut self,
        frame: &Frame,
        now_ms: u64,
        logger: &mut dyn PipelineLogger,
    ) -> Result<CycleReport, DetectionError> {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        if let Some(done) = self.poll_background() {
            let (boxes, small) = self.finish_background(done, logger)?;
            self.update_tracks(&boxes, &small, frame, now_ms, logger, &mut report);
        }

        if self.detection_due(now_ms) {
            self.last_detection_ms = Some(now_ms);
            let start = Instant::now();
            let small = frame.scaled(self.config.processing_scale);
            logger.timing("preprocess", elapsed_ms(start.elapsed()));

            if let Some(Backend::Background(bg)) = self.backend.as_mut() {
                if !bg.submit(small) {
                    log::debug!("{} busy, skipping cycle {}", bg.name(), self.cycle);
                }
            } else {
                let boxes = self.detect_inline(&small, logger)?;
                self.update_tracks(&boxes, &small, frame, now_ms, logger, &mut report);
            }
        }

        report.tracks = self.live.clone();
        report.overlays = self.live.iter().map(OverlayItem::from_track).collect();
        Ok(report)
    }

    fn detection_due(&self, now_ms: u64) -> bool {
        let nth = u64::from(self.config.schedule.every_nth_cycle.max(1));
        self.cycle % nth == 0
            && self.last_detection_ms.map_or(true, |last| {
                now_ms.saturating_sub(last) >= self.config.schedule.min_detection_interval_ms
            })
    }

    fn poll_background(&mut self) -> Option<BackgroundResult> {
        match self.backend.as_mut() {
            Some(Backend::Background(bg)) => bg.poll(),
            _ => None,
        }
    }

    /// Returns the boxes together with the frame they were found on.
    fn finish_background(
        &mut self,
        done: BackgroundResult,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(Vec<BoundingBox>, Frame), DetectionError> {
        let name = self.detector_name().to_string();
        let BackgroundResult {
            frame,
            result,
            elapsed,
        } = done;
        let boxes = match result {
            Ok(boxes) => {
                self.record_detect_time(&name, elapsed, logger);
                boxes
            }
            Err(DetectionError::BackendUnavailable(reason)) => {
                self.fall_back(&name, &reason);
                run_heuristic(&mut self.heuristic, &frame, logger)?
            }
            Err(e) => return Err(e),
        };
        Ok((boxes, frame))
    }

    fn detect_inline(
        &mut self,
        small: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<BoundingBox>, DetectionError> {
        let start = Instant::now();
        let (name, result) = match self.backend.as_mut() {
            Some(Backend::Inline(det)) => (det.name().to_string(), det.detect(small)),
            _ => (
                self.heuristic.name().to_string(),
                run_heuristic(&mut self.heuristic, small, logger),
            ),
        };
        match result {
            Ok(boxes) => {
                self.record_detect_time(&name, start.elapsed(), logger);
                Ok(boxes)
            }
            Err(DetectionError::BackendUnavailable(reason)) if self.backend.is_some() => {
                self.fall_back(&name, &reason);
                run_heuristic(&mut self.heuristic, small, logger)
            }
            Err(e) => Err(e),
        }
    }

    /// Drops the model backend for the rest of the session.
    fn fall_back(&mut self, name: &str, reason: &str) {
        log::warn!("{name} backend unavailable ({reason}), falling back to heuristic detection");
        self.backend = None;
    }

    fn record_detect_time(&self, name: &str, elapsed: Duration, logger: &mut dyn PipelineLogger) {
        let ms = elapsed_ms(elapsed);
        logger.timing("detect", ms);
        if elapsed.as_millis() as u64 > SLOW_DETECTION_MS {
            log::warn!("Detection took {ms:.2}ms ({name})");
        }
    }

    /// Deduplicates and colour-tags at processing resolution, scales to the
    /// rendered frame, then tracks, classifies and emits.
    fn update_tracks(
        &mut self,
        boxes: &[BoundingBox],
        small: &Frame,
        rendered: &Frame,
        now_ms: u64,
        logger: &mut dyn PipelineLogger,
        report: &mut CycleReport,
    ) {
        let start = Instant::now();
        let kept = self.deduplicator.deduplicate(boxes.to_vec());
        let sx = rendered.width() as f64 / small.width() as f64;
        let sy = rendered.height() as f64 / small.height() as f64;
        let observations: Vec<Observation> = kept
            .iter()
            .map(|b| {
                let tag = tag_region(small, b);
                Observation::new(
                    b.scaled(sx, sy).clamped(rendered.width(), rendered.height()),
                    tag,
                )
            })
            .collect();

        self.tracker.update(&observations, now_ms);
        let tiers = self.sizes.tiers();
        let top_tier = tiers.terminal().name.clone();
        for track in self.tracker.tracks_mut() {
            let name = self
                .classifier
                .classify(tiers, track.length_cm, track.width_cm);
            track.category = Some(name.to_string());
        }
        self.live = self.tracker.live_tracks();
        logger.timing("track", elapsed_ms(start.elapsed()));
        logger.metric("candidates", observations.len() as f64);
        logger.metric("live_tracks", self.live.len() as f64);

        let start = Instant::now();
        report.emitted = self.emitter.emit(
            &self.live,
            &top_tier,
            now_ms,
            &mut *self.detection_sink,
            &mut *self.notification_sink,
        );
        report.harvest_warnings = self.emitter.harvest_warnings(&self.live, &top_tier, now_ms);
        logger.timing("emit", elapsed_ms(start.elapsed()));

        report.detection_ran = true;
        report.detections = observations.len();
    }
}

/// Runs the heuristic and reports the edge thresholds it settled on.
fn run_heuristic(
    heuristic: &mut HeuristicFishDetector,
    frame: &Frame,
    logger: &mut dyn PipelineLogger,
) -> Result<Vec<BoundingBox>, DetectionError> {
    let boxes = heuristic.detect(frame)?;
    if let Some(t) = heuristic.last_thresholds() {
        logger.metric("edge_threshold", f64::from(t.low));
        logger.metric("strong_edge_threshold", f64::from(t.high));
    }
    Ok(boxes)
}

fn elapsed_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
