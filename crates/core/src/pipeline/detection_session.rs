use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::detection_engine::{CycleReport, DetectionEngine};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::cancellation::CancellationToken;
use crate::shared::clock::Clock;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to acquire frame source: {0}")]
    Acquire(#[source] FrameSourceError),
    #[error("frame source lost: {0}")]
    ResourceLost(#[source] FrameSourceError),
    #[error("a session is already running")]
    AlreadyRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Running,
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Acquiring => write!(f, "acquiring"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Totals for one completed session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    pub detection_cycles: usize,
    /// Frames skipped or cycles that failed and were carried over.
    pub errors: usize,
    pub persisted: usize,
    pub notified: usize,
    pub max_live_tracks: usize,
}

/// Counts cycles per wall-clock window of at least one second.
#[derive(Debug, Default)]
struct FpsCounter {
    window_start_ms: Option<u64>,
    count: u32,
}

impl FpsCounter {
    /// Registers one cycle; returns the rate when a window closes.
    fn tick(&mut self, now_ms: u64) -> Option<f64> {
        let start = *self.window_start_ms.get_or_insert(now_ms);
        self.count += 1;
        let elapsed = now_ms.saturating_sub(start);
        if elapsed < 1_000 {
            return None;
        }
        let fps = f64::from(self.count) * 1_000.0 / elapsed as f64;
        self.window_start_ms = Some(now_ms);
        self.count = 0;
        Some(fps)
    }
}

/// Drives a [`DetectionEngine`] over an exclusively owned [`FrameSource`].
///
/// States run Idle, Acquiring, Running, Stopping and back to Idle. The
/// source is closed on every exit path, including a failed open. The loop
/// checks the cancellation token once per cycle.
pub struct DetectionSession {
    engine: DetectionEngine,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    state: SessionState,
    max_frames: Option<usize>,
    frame_time: bool,
}

impl DetectionSession {
    pub fn new(engine: DetectionEngine, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
            max_frames: None,
            frame_time: false,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Uses the session start time plus each frame's own timestamp as "now"
    /// instead of the clock. For recorded input played faster than real time.
    pub fn with_frame_time(mut self, enabled: bool) -> Self {
        self.frame_time = enabled;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn transition(&mut self, next: SessionState) {
        log::info!("Session {} -> {}", self.state, next);
        self.state = next;
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        logger: &mut dyn PipelineLogger,
        mut on_cycle: impl FnMut(&CycleReport),
    ) -> Result<SessionSummary, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }

        self.transition(SessionState::Acquiring);
        if let Err(e) = source.open() {
            source.close();
            self.transition(SessionState::Idle);
            return Err(SessionError::Acquire(e));
        }
        self.engine.reset();
        logger.info(&format!("Detecting with {}", self.engine.detector_name()));

        self.transition(SessionState::Running);
        let result = self.run_loop(source, logger, &mut on_cycle);

        self.transition(SessionState::Stopping);
        source.close();
        logger.summary();
        self.transition(SessionState::Idle);
        result
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        logger: &mut dyn PipelineLogger,
        on_cycle: &mut dyn FnMut(&CycleReport),
    ) -> Result<SessionSummary, SessionError> {
        let mut summary = SessionSummary::default();
        let mut fps = FpsCounter::default();
        let started_ms = self.clock.now_ms();
        let total = self.max_frames.unwrap_or(0);

        loop {
            if self.cancel.is_cancelled() {
                log::info!("Stop requested after {} frames", summary.frames);
                break;
            }
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("Frame source exhausted after {} frames", summary.frames);
                    break;
                }
                Err(e) if e.is_transient() => {
                    log::warn!("Skipping frame: {e}");
                    summary.errors += 1;
                    continue;
                }
                Err(e) => return Err(SessionError::ResourceLost(e)),
            };

            let now_ms = if self.frame_time {
                started_ms + frame.timestamp_ms()
            } else {
                self.clock.now_ms()
            };
            summary.frames += 1;
            logger.progress(summary.frames, total);
            if let Some(rate) = fps.tick(now_ms) {
                logger.metric("fps", rate);
            }

            match self.engine.process(&frame, now_ms, logger) {
                Ok(report) => {
                    if report.detection_ran {
                        summary.detection_cycles += 1;
                    }
                    if report.emitted.persisted.is_some() {
                        summary.persisted += 1;
                    }
                    if report.emitted.notified {
                        summary.notified += 1;
                    }
                    summary.max_live_tracks = summary.max_live_tracks.max(report.tracks.len());
                    on_cycle(&report);
                }
                Err(e) => {
                    log::warn!("Cycle on frame {} failed: {e}", frame.index());
                    summary.errors += 1;
                }
            }
        }
        Ok(summary)
    }
}
