pub mod cached_size_config;
pub mod json_size_config_source;
