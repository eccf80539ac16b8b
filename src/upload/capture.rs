//! Frame acquisition.
//!
//! # Responsibilities
//! - Abstract the camera behind [`FrameSource`]
//! - Hand out frames whose buffer is returned to the source exactly once
//! - Name captures after the local wall-clock time
//!
//! # Design Decisions
//! - Release is tied to `Drop`, so every exit path of an upload returns the
//!   buffer without explicit calls at each return site

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use thiserror::Error;

/// Errors raised while acquiring a frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read frame from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("camera returned an empty frame")]
    Empty,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A captured image buffer.
///
/// The optional release hook runs once when the frame is dropped.
pub struct Frame {
    data: Vec<u8>,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, release: None }
    }

    /// Frame that notifies its owner when the buffer is released.
    pub fn with_release(data: Vec<u8>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            data,
            release: Some(Box::new(release)),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Anything that can produce a JPEG frame.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Serves the contents of a file as the captured frame.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let data = std::fs::read(&self.path).map_err(|source| CaptureError::Io {
            path: self.path.clone(),
            source,
        })?;
        if data.is_empty() {
            return Err(CaptureError::Empty);
        }
        tracing::debug!(path = ?self.path, bytes = data.len(), "Frame captured");
        Ok(Frame::new(data))
    }
}

/// Filename for a capture taken at `now`, e.g. `esp_capture_20250301_141503.jpg`.
pub fn capture_filename(now: Option<DateTime<Local>>, uptime_ms: u128) -> String {
    match now {
        Some(now) => format!("esp_capture_{}.jpg", now.format("%Y%m%d_%H%M%S")),
        None => {
            tracing::warn!("Local time unavailable while naming capture");
            format!("esp_capture_unknown_{}.jpg", uptime_ms)
        }
    }
}

/// Monotonic clock started with the process, used where wall time is unusable.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    start: Instant,
}

impl Uptime {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn millis(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}
