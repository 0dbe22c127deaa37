use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use fishwatch_core::classification::domain::size_config_source::{
    SizeConfigSource, StaticSizeConfig,
};
use fishwatch_core::classification::infrastructure::cached_size_config::CachedSizeConfig;
use fishwatch_core::classification::infrastructure::json_size_config_source::JsonSizeConfigSource;
use fishwatch_core::detection::domain::fish_detector::FishDetector;
use fishwatch_core::detection::infrastructure::background_detector::BackgroundDetector;
use fishwatch_core::detection::infrastructure::http_model_detector::HttpModelDetector;
use fishwatch_core::events::domain::event_sink::{DetectionSink, NotificationSink};
use fishwatch_core::events::infrastructure::json_lines_sink::JsonLinesSink;
use fishwatch_core::events::infrastructure::log_sinks::{LogDetectionSink, LogNotificationSink};
use fishwatch_core::pipeline::detection_engine::{CycleReport, DetectionEngine};
use fishwatch_core::pipeline::detection_session::DetectionSession;
use fishwatch_core::pipeline::engine_config::EngineConfig;
use fishwatch_core::pipeline::pipeline_logger::LogPipelineLogger;
use fishwatch_core::shared::cancellation::CancellationToken;
use fishwatch_core::shared::clock::{Clock, SystemClock};
use fishwatch_core::video::domain::frame_source::FrameSource;
use fishwatch_core::video::infrastructure::image_sequence_source::ImageSequenceSource;
use fishwatch_core::video::infrastructure::synthetic_source::SyntheticSource;

/// Fish detection, tracking and size classification over a frame stream.
#[derive(Parser)]
#[command(name = "fishwatch")]
struct Cli {
    /// Directory of frames (jpg, png, ...) played in file-name order.
    #[arg(long, conflicts_with = "synthetic")]
    frames: Option<PathBuf>,

    /// Generate N synthetic frames with one drifting fish instead.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Engine config JSON (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size tier JSON, range or legacy form (defaults to the platform config dir).
    #[arg(long)]
    sizes: Option<PathBuf>,

    /// Base URL of a detection model service, e.g. http://localhost:8000.
    #[arg(long)]
    backend_url: Option<String>,

    /// Local ONNX detection model.
    #[cfg(feature = "onnx")]
    #[arg(long, conflicts_with = "backend_url")]
    model: Option<PathBuf>,

    /// Call the model backend on the processing thread instead of a worker.
    #[arg(long)]
    inline_backend: bool,

    /// Run detection every Nth frame (1 = every frame).
    #[arg(long)]
    every_nth: Option<u32>,

    /// Minimum milliseconds between detection runs.
    #[arg(long)]
    min_interval_ms: Option<u64>,

    /// Resolution factor for detection (0.0-1.0].
    #[arg(long)]
    processing_scale: Option<f64>,

    /// Append detection and notification events as JSON lines to this file.
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Timestamp step between frames for file and synthetic sources.
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Write the effective engine config (file plus flag overrides) here and exit.
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    if let Some(path) = &cli.write_config {
        config.save(path)?;
        log::info!("Wrote engine config to {}", path.display());
        return Ok(());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cancel = CancellationToken::new();

    let sizes = CachedSizeConfig::new(
        size_source(&cli),
        Duration::from_secs(config.size_config_ttl_secs),
        clock.clone(),
    );
    let (detections, notifications) = build_sinks(&cli)?;
    let mut engine = DetectionEngine::new(config, sizes, detections, notifications);
    if let Some(detector) = build_backend(&cli) {
        engine = if cli.inline_backend {
            engine.with_backend(detector)
        } else {
            engine.with_background_backend(BackgroundDetector::spawn(detector, cancel.clone()))
        };
    }

    let mut source = build_source(&cli)?;
    let mut session = DetectionSession::new(engine, clock)
        .with_max_frames(cli.max_frames)
        .with_frame_time(true)
        .with_cancellation(cancel);
    let mut logger = LogPipelineLogger::default();

    let summary = session.run(source.as_mut(), &mut logger, print_cycle)?;
    log::info!(
        "Done: {} frames, {} detection cycles, {} events saved, {} alerts, up to {} fish at once",
        summary.frames,
        summary.detection_cycles,
        summary.persisted,
        summary.notified,
        summary.max_live_tracks
    );
    if summary.errors > 0 {
        log::warn!("{} frames or cycles failed", summary.errors);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match cli.config.clone().or_else(EngineConfig::default_path) {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    if let Some(n) = cli.every_nth {
        config.schedule.every_nth_cycle = n;
    }
    if let Some(ms) = cli.min_interval_ms {
        config.schedule.min_detection_interval_ms = ms;
    }
    if let Some(scale) = cli.processing_scale {
        config.processing_scale = scale;
    }
    config.validate()?;
    Ok(config)
}

fn size_source(cli: &Cli) -> Box<dyn SizeConfigSource> {
    match cli.sizes.clone().or_else(JsonSizeConfigSource::default_path) {
        Some(path) if cli.sizes.is_some() || path.exists() => {
            log::info!("Size tiers from {}", path.display());
            Box::new(JsonSizeConfigSource::new(path))
        }
        _ => Box::new(StaticSizeConfig::defaults()),
    }
}

fn build_sinks(
    cli: &Cli,
) -> Result<(Box<dyn DetectionSink>, Box<dyn NotificationSink>), Box<dyn std::error::Error>> {
    match &cli.events_out {
        Some(path) => Ok((
            Box::new(JsonLinesSink::open(path)?),
            Box::new(JsonLinesSink::open(path)?),
        )),
        None => Ok((Box::new(LogDetectionSink), Box::new(LogNotificationSink))),
    }
}

/// An unreachable backend is not fatal: detection falls back to the
/// built-in heuristic.
fn build_backend(cli: &Cli) -> Option<Box<dyn FishDetector>> {
    #[cfg(feature = "onnx")]
    if let Some(model) = &cli.model {
        use fishwatch_core::detection::infrastructure::onnx_model_detector::{
            OnnxModelDetector, DEFAULT_MIN_SCORE,
        };
        match OnnxModelDetector::new(model, DEFAULT_MIN_SCORE) {
            Ok(detector) => return Some(Box::new(detector)),
            Err(e) => {
                log::warn!("Model unavailable, using heuristic detection: {e}");
                return None;
            }
        }
    }

    let url = cli.backend_url.as_deref()?;
    match HttpModelDetector::connect(url) {
        Ok(detector) => {
            log::info!("Using detection service at {url}");
            Some(Box::new(detector))
        }
        Err(e) => {
            log::warn!("Detection service unavailable, using heuristic detection: {e}");
            None
        }
    }
}

fn build_source(cli: &Cli) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if let Some(dir) = &cli.frames {
        let mut source = ImageSequenceSource::new(dir);
        if let Some(ms) = cli.frame_interval_ms {
            source = source.with_frame_interval_ms(ms);
        }
        return Ok(Box::new(source));
    }
    match cli.synthetic {
        Some(n) => {
            let mut source = SyntheticSource::single_fish(640, 480, n);
            if let Some(ms) = cli.frame_interval_ms {
                source = source.with_frame_interval_ms(ms);
            }
            Ok(Box::new(source))
        }
        None => Err("One of --frames or --synthetic is required".into()),
    }
}

fn print_cycle(report: &CycleReport) {
    if !report.detection_ran {
        return;
    }
    for item in &report.overlays {
        log::debug!(
            "cycle {}: {} at ({:.0}, {:.0}) {:.0}x{:.0} [{}]",
            report.cycle,
            item.label,
            item.x,
            item.y,
            item.width,
            item.height,
            item.color_tag
        );
    }
    for warning in &report.harvest_warnings {
        println!(
            "Harvest: fish {} {:.2}cm x {:.2}cm",
            warning.rank, warning.length_cm, warning.width_cm
        );
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match (&cli.frames, cli.synthetic) {
        (None, None) if cli.write_config.is_none() => {
            return Err("One of --frames or --synthetic is required".into())
        }
        (Some(dir), _) if !dir.is_dir() => {
            return Err(format!("Frame directory not found: {}", dir.display()).into())
        }
        (_, Some(0)) => return Err("--synthetic needs at least 1 frame".into()),
        _ => {}
    }
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    if let Some(path) = &cli.sizes {
        if !path.exists() {
            return Err(format!("Size file not found: {}", path.display()).into());
        }
    }
    if let Some(url) = &cli.backend_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Backend URL must start with http:// or https://, got '{url}'").into());
        }
    }
    #[cfg(feature = "onnx")]
    if let Some(model) = &cli.model {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if cli.every_nth == Some(0) {
        return Err("--every-nth must be at least 1".into());
    }
    if let Some(scale) = cli.processing_scale {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(format!("Processing scale must be in (0.0, 1.0], got {scale}").into());
        }
    }
    if cli.frame_interval_ms == Some(0) {
        return Err("--frame-interval-ms must be at least 1".into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    Ok(())
}
