pub mod bounding_box;
pub mod cache;
pub mod cancellation;
pub mod clock;
pub mod config_error;
pub mod constants;
pub mod frame;
