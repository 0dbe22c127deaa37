use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Nominal spacing of frame timestamps (30 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// Plays a directory of still images, sorted by file name, as a frame stream.
pub struct ImageSequenceSource {
    dir: PathBuf,
    frame_interval_ms: u64,
    files: Vec<PathBuf>,
    cursor: usize,
    opened: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            files: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    pub fn with_frame_interval_ms(mut self, interval_ms: u64) -> Self {
        self.frame_interval_ms = interval_ms;
        self
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn map_open_error(dir: &Path, e: std::io::Error) -> FrameSourceError {
    let what = dir.display().to_string();
    match e.kind() {
        ErrorKind::NotFound => FrameSourceError::NotFound(what),
        ErrorKind::PermissionDenied => FrameSourceError::PermissionDenied(what),
        _ => FrameSourceError::Io(e),
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), FrameSourceError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| map_open_error(&self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(FrameSourceError::NotFound(format!(
                "no images in {}",
                self.dir.display()
            )));
        }
        files.sort();
        log::info!("Opened {} images from {}", files.len(), self.dir.display());

        self.files = files;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if !self.opened {
            return Err(FrameSourceError::Disconnected("source is not open".into()));
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.cursor;
        self.cursor += 1;

        let img = image::open(path)
            .map_err(|e| FrameSourceError::Decode(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = (img.width(), img.height());
        let timestamp_ms = index as u64 * self.frame_interval_ms;
        Frame::from_rgb(img.into_raw(), width, height, index, timestamp_ms)
            .map(Some)
            .ok_or_else(|| FrameSourceError::Decode(format!("{}: empty image", path.display())))
    }

    fn close(&mut self) {
        self.files.clear();
        self.cursor = 0;
        self.opened = false;
    }
}
