pub mod size_classifier;
pub mod size_config_source;
pub mod size_range;
