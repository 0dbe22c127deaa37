use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device busy: {0}")]
    Busy(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("source disconnected: {0}")]
    Disconnected(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameSourceError {
    /// Whether the session can carry on with the next frame after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, FrameSourceError::Decode(_) | FrameSourceError::Io(_))
    }
}

/// An exclusively owned supplier of frames (camera, file sequence, generator).
///
/// A session calls `open` once, pulls frames until `Ok(None)` or a fatal
/// error, and always calls `close`, including when `open` failed partway.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), FrameSourceError>;

    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;

    /// Releases the underlying resource. Must be safe to call repeatedly.
    fn close(&mut self);
}
