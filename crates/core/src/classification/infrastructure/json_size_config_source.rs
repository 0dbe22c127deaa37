use std::path::{Path, PathBuf};

use crate::classification::domain::size_config_source::SizeConfigSource;
use crate::classification::domain::size_range::SizeSettings;
use crate::shared::config_error::ConfigError;
use crate::shared::constants::{APP_DIR_NAME, SIZE_CONFIG_FILENAME};

/// Reads size settings from a JSON file in either the range or the legacy form.
pub struct JsonSizeConfigSource {
    path: PathBuf,
}

impl JsonSizeConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/FishWatch/sizes.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(SIZE_CONFIG_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SizeConfigSource for JsonSizeConfigSource {
    fn load(&mut self) -> Result<SizeSettings, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_range_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"small": {{"minLength": 0, "maxLength": 4, "minWidth": 0, "maxWidth": 2}},
                "large": {{"minLength": 4.1, "maxLength": 999, "minWidth": 2.1, "maxWidth": 999}}}}"#
        )
        .unwrap();

        let mut source = JsonSizeConfigSource::new(file.path());
        let settings = source.load().unwrap();
        match settings {
            SizeSettings::Ranges(map) => assert_eq!(map.len(), 2),
            other => panic!("expected ranges, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = JsonSizeConfigSource::new(dir.path().join("nope.json"));
        assert!(matches!(source.load(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let mut source = JsonSizeConfigSource::new(file.path());
        assert!(matches!(source.load(), Err(ConfigError::Parse { .. })));
    }
}
