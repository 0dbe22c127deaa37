use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detection::domain::blob_segmenter::SegmenterConfig;
use crate::detection::domain::candidate_scorer::ScorerConfig;
use crate::detection::domain::deduplicator::NmsConfig;
use crate::detection::domain::preprocessor::PreprocessConfig;
use crate::events::domain::event_emitter::EmitterConfig;
use crate::shared::config_error::ConfigError;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_PIXEL_TO_CM, ENGINE_CONFIG_FILENAME, SIZE_CONFIG_TTL_SECS,
};
use crate::tracking::domain::fish_tracker::TrackerConfig;

/// When full detection runs relative to drawn frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Detect on every Nth cycle only.
    pub every_nth_cycle: u32,
    /// And never more often than this.
    pub min_detection_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            every_nth_cycle: 3,
            min_detection_interval_ms: 100,
        }
    }
}

/// Every tunable of the detection engine. Missing fields take their
/// defaults, so a partial JSON file only overrides what it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub preprocess: PreprocessConfig,
    pub segmenter: SegmenterConfig,
    pub scorer: ScorerConfig,
    pub nms: NmsConfig,
    pub tracker: TrackerConfig,
    pub emitter: EmitterConfig,
    pub schedule: ScheduleConfig,
    /// Detection runs on a copy of the frame resized by this factor.
    pub processing_scale: f64,
    /// Centimetres per rendered-frame pixel.
    pub pixel_to_cm: f64,
    pub size_config_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            segmenter: SegmenterConfig::default(),
            scorer: ScorerConfig::default(),
            nms: NmsConfig::default(),
            tracker: TrackerConfig::default(),
            emitter: EmitterConfig::default(),
            schedule: ScheduleConfig::default(),
            processing_scale: 0.5,
            pixel_to_cm: DEFAULT_PIXEL_TO_CM,
            size_config_ttl_secs: SIZE_CONFIG_TTL_SECS,
        }
    }
}

impl EngineConfig {
    /// `<config dir>/FishWatch/engine.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(ENGINE_CONFIG_FILENAME))
    }

    /// Reads and validates a JSON config. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No engine config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.processing_scale > 0.0 && self.processing_scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "processing_scale must be in (0, 1], got {}",
                self.processing_scale
            )));
        }
        if self.pixel_to_cm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pixel_to_cm must be positive, got {}",
                self.pixel_to_cm
            )));
        }
        if self.schedule.every_nth_cycle == 0 {
            return Err(ConfigError::Invalid(
                "schedule.every_nth_cycle must be at least 1".into(),
            ));
        }
        if self.tracker.max_track_age == 0 {
            return Err(ConfigError::Invalid(
                "tracker.max_track_age must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
