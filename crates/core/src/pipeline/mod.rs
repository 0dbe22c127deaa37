pub mod detection_engine;
pub mod detection_session;
pub mod engine_config;
pub mod pipeline_logger;
