use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::events::domain::detection_event::DetectionEvent;
use crate::events::domain::event_sink::{DetectionSink, NotificationSink, SinkError};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Detection(&'a DetectionEvent),
    Notification {
        message: &'a str,
        event: &'a DetectionEvent,
    },
}

/// Appends one JSON object per line to a file. Each record is flushed
/// immediately so the file stays readable while a session runs.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&mut self, record: &Record<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl DetectionSink for JsonLinesSink {
    fn persist(&mut self, event: &DetectionEvent) -> Result<(), SinkError> {
        self.write_record(&Record::Detection(event))
    }
}

impl NotificationSink for JsonLinesSink {
    fn notify(&mut self, message: &str, event: &DetectionEvent) -> Result<(), SinkError> {
        self.write_record(&Record::Notification { message, event })
    }
}
