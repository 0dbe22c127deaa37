pub mod detection_event;
pub mod event_emitter;
pub mod event_sink;
