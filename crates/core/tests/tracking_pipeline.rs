use std::sync::Arc;
use std::time::Duration;

use fishwatch_core::classification::domain::size_config_source::StaticSizeConfig;
use fishwatch_core::classification::infrastructure::cached_size_config::CachedSizeConfig;
use fishwatch_core::events::infrastructure::log_sinks::{LogDetectionSink, LogNotificationSink};
use fishwatch_core::pipeline::detection_engine::{CycleReport, DetectionEngine};
use fishwatch_core::pipeline::detection_session::DetectionSession;
use fishwatch_core::pipeline::engine_config::EngineConfig;
use fishwatch_core::pipeline::pipeline_logger::NullPipelineLogger;
use fishwatch_core::shared::clock::{Clock, ManualClock};
use fishwatch_core::video::infrastructure::synthetic_source::{SyntheticFish, SyntheticSource};

const FRAMES: usize = 12;

fn drifting_fish() -> SyntheticSource {
    let fish = SyntheticFish {
        center_x: 112.0,
        center_y: 120.0,
        radius_x: 60.0,
        radius_y: 20.0,
        velocity_x: 2.0,
        velocity_y: 0.5,
    };
    SyntheticSource::new(320, 240, FRAMES, vec![fish])
}

fn run_session(mut source: SyntheticSource) -> Vec<CycleReport> {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_000_000));
    let mut config = EngineConfig::default();
    config.processing_scale = 1.0;
    config.schedule.every_nth_cycle = 1;
    config.schedule.min_detection_interval_ms = 0;

    let sizes = CachedSizeConfig::new(
        Box::new(StaticSizeConfig::defaults()),
        Duration::from_secs(60),
        clock.clone(),
    );
    let engine = DetectionEngine::new(
        config,
        sizes,
        Box::new(LogDetectionSink),
        Box::new(LogNotificationSink),
    );
    let mut session = DetectionSession::new(engine, clock).with_frame_time(true);

    let mut reports = Vec::new();
    let summary = session
        .run(&mut source, &mut NullPipelineLogger, |r| reports.push(r.clone()))
        .unwrap();
    assert_eq!(summary.frames, FRAMES);
    assert_eq!(summary.errors, 0);
    reports
}

#[test]
fn test_single_fish_yields_one_stable_track() {
    let reports = run_session(drifting_fish());
    assert_eq!(reports.len(), FRAMES);
    assert!(reports.iter().all(|r| r.detection_ran));

    let ids: Vec<u32> = reports[2..]
        .iter()
        .map(|r| {
            assert_eq!(r.tracks.len(), 1, "cycle {}", r.cycle);
            r.tracks[0].track.id
        })
        .collect();
    assert!(ids.iter().all(|&id| id == ids[0]), "ids changed: {ids:?}");
}

#[test]
fn test_single_fish_is_classified_consistently() {
    let reports = run_session(drifting_fish());
    for r in &reports[2..] {
        let track = &r.tracks[0].track;
        assert_eq!(track.category.as_deref(), Some("Medium"), "cycle {}", r.cycle);
        assert!(track.length_cm > 9.0 && track.length_cm < 10.0);
        assert!(track.width_cm > 3.0 && track.width_cm < 3.6);
    }
}

#[test]
fn test_track_center_moves_smoothly() {
    let reports = run_session(drifting_fish());
    // Fish speed is sqrt(2^2 + 0.5^2) ~ 2.06 px per frame; allow for
    // whole-pixel rounding of the detected box.
    let max_step = 2.5;
    let centers: Vec<(f64, f64)> = reports
        .iter()
        .map(|r| r.tracks[0].track.center())
        .collect();
    for pair in centers.windows(2) {
        let (ax, ay) = pair[0];
        let (bx, by) = pair[1];
        let step = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
        assert!(step <= max_step, "jump of {step:.2}px between {pair:?}");
    }
    // And it does follow the fish to the right.
    assert!(centers[FRAMES - 1].0 > centers[0].0 + 5.0);
}

#[test]
fn test_empty_water_yields_no_tracks() {
    let reports = run_session(SyntheticSource::new(320, 240, FRAMES, Vec::new()));
    assert!(reports.iter().all(|r| r.tracks.is_empty()));
}
