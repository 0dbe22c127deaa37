use crate::events::domain::detection_event::DetectionEvent;
use crate::events::domain::event_sink::{DetectionSink, NotificationSink, SinkError};

/// Writes persisted detections to the log. The default when no output
/// file is configured.
#[derive(Debug, Default)]
pub struct LogDetectionSink;

impl DetectionSink for LogDetectionSink {
    fn persist(&mut self, event: &DetectionEvent) -> Result<(), SinkError> {
        log::info!(
            "Detection: {} {:.2}cm x {:.2}cm ({:.1}%)",
            event.category,
            event.length_cm,
            event.width_cm,
            event.confidence_percent
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&mut self, message: &str, _event: &DetectionEvent) -> Result<(), SinkError> {
        log::warn!("{message}");
        Ok(())
    }
}
