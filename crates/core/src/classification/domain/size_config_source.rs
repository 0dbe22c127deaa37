use super::size_range::{SizeSettings, SizeTiers};
use crate::shared::config_error::ConfigError;

/// Where size settings come from. Implementations may hit the disk on
/// every call; wrap them in `CachedSizeConfig`.
pub trait SizeConfigSource: Send {
    fn load(&mut self) -> Result<SizeSettings, ConfigError>;
}

/// Fixed settings, for when no settings file is configured.
pub struct StaticSizeConfig {
    settings: SizeSettings,
}

impl StaticSizeConfig {
    pub fn new(settings: SizeSettings) -> Self {
        Self { settings }
    }

    /// Small, Medium and Large with the built-in bounds.
    pub fn defaults() -> Self {
        Self::new(SizeTiers::default().to_settings())
    }
}

impl SizeConfigSource for StaticSizeConfig {
    fn load(&mut self) -> Result<SizeSettings, ConfigError> {
        Ok(self.settings.clone())
    }
}
