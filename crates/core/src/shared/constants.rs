/// Directory (under the platform config dir) holding engine and size settings.
pub const APP_DIR_NAME: &str = "FishWatch";
pub const ENGINE_CONFIG_FILENAME: &str = "engine.json";
pub const SIZE_CONFIG_FILENAME: &str = "sizes.json";

/// Centimetres per rendered-frame pixel.
pub const DEFAULT_PIXEL_TO_CM: f64 = 0.08;

pub const SIZE_CONFIG_TTL_SECS: u64 = 60;

/// Detections slower than this are logged as a warning.
pub const SLOW_DETECTION_MS: u64 = 100;

pub const BACKEND_HEALTH_TIMEOUT_SECS: u64 = 2;
pub const BACKEND_DETECT_TIMEOUT_SECS: u64 = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
