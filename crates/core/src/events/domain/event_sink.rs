use thiserror::Error;

use super::detection_event::DetectionEvent;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink rejected event: {0}")]
    Rejected(String),
}

/// Stores detection events (database, file, remote API).
pub trait DetectionSink: Send {
    fn persist(&mut self, event: &DetectionEvent) -> Result<(), SinkError>;
}

/// Delivers a human-readable alert (SMS, push, chat).
pub trait NotificationSink: Send {
    fn notify(&mut self, message: &str, event: &DetectionEvent) -> Result<(), SinkError>;
}
