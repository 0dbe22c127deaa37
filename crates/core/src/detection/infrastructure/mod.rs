pub mod background_detector;
pub mod heuristic_fish_detector;
pub mod http_model_detector;
#[cfg(feature = "onnx")]
pub mod onnx_model_detector;
