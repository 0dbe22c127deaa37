pub mod json_lines_sink;
pub mod log_sinks;
