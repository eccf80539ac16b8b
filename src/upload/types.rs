//! Upload payloads, outcomes and error definitions.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::http::response::ResponseError;
use crate::http::url::UrlError;
use crate::upload::capture::{CaptureError, Frame};

/// Everything sent in one upload. Dropping it releases the frame.
#[derive(Debug)]
pub struct UploadPayload {
    /// Hardware identifier, sent as the `mac` field.
    pub device_id: u64,
    /// Battery level in [0, 1].
    pub battery_fraction: f32,
    pub image: Frame,
    pub filename: String,
}

impl UploadPayload {
    /// Battery fraction as sent on the wire, clamped and with two decimals.
    pub fn battery_field(&self) -> String {
        format!("{:.2}", self.battery_fraction.clamp(0.0, 1.0))
    }
}

/// Errors that end an upload. Each maps to a distinct result code.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No frame could be captured.
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// The upload URL has no usable host.
    #[error("invalid upload URL: {0}")]
    Url(#[from] UrlError),

    /// The collector could not be reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// A write transferred nothing or failed outright.
    #[error("transport write failed after {sent} bytes: {reason}")]
    TransportWrite { sent: u64, reason: String },

    /// The response did not start with an HTTP/1.x status line.
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    /// The collector went silent before finishing its status line or headers.
    #[error("no response data within {0:?}")]
    Timeout(Duration),

    /// The collector answered outside the 2xx range.
    #[error("collector answered with status {0}")]
    NonSuccessStatus(u16),
}

impl UploadError {
    /// Result code reported to the caller: negative sentinels for local
    /// failures, the HTTP status for non-success answers.
    ///
    /// | code | failure |
    /// |------|---------|
    /// | -1 | capture |
    /// | -2 | unusable URL or connect failure; both mean no connection was made |
    /// | -3 | transport write |
    /// | -4 | malformed status line |
    /// | -5 | response timeout |
    ///
    /// Use [`UploadError::kind`] to tell an unusable URL from a refused
    /// connection.
    pub fn code(&self) -> i32 {
        match self {
            UploadError::Capture(_) => -1,
            UploadError::Url(_) | UploadError::Connect { .. } => -2,
            UploadError::TransportWrite { .. } => -3,
            UploadError::MalformedStatusLine(_) => -4,
            UploadError::Timeout(_) => -5,
            UploadError::NonSuccessStatus(status) => i32::from(*status),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Capture(_) => "capture",
            UploadError::Url(_) => "url",
            UploadError::Connect { .. } => "connect",
            UploadError::TransportWrite { .. } => "write",
            UploadError::MalformedStatusLine(_) => "malformed_status",
            UploadError::Timeout(_) => "timeout",
            UploadError::NonSuccessStatus(_) => "status",
        }
    }
}

impl From<ResponseError> for UploadError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::MalformedStatusLine(line) => UploadError::MalformedStatusLine(line),
            ResponseError::Timeout(window) => UploadError::Timeout(window),
        }
    }
}

/// A detected circle in the collector's analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Circle {
    #[serde(default)]
    pub radius: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

/// JSON body returned by the collector after an upload.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct DetectionReport {
    pub circles: Vec<Circle>,
    pub message: Option<String>,
}

impl DetectionReport {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Successful upload outcome.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub status: u16,
    pub bytes_sent: u64,
    pub report: Option<DetectionReport>,
}
