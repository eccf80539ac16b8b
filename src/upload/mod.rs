//! Image upload subsystem.
//!
//! # Data Flow
//! ```text
//! FrameSource::capture (capture.rs)
//!     → UploadPayload (types.rs, owns the frame)
//!     → MultipartEnvelope (http/multipart.rs)
//!     → OutboundConnection::send (http/transport.rs)
//!     → UploadReceipt or UploadError (result code)
//!     → payload dropped, frame released
//! ```
//!
//! # Design Decisions
//! - The payload lives for exactly one call; every return path drops it
//! - Result codes are negative sentinels for local failures and the HTTP
//!   status otherwise, so callers can log one number
//! - The collector's JSON answer is informational; failing to parse it does
//!   not fail the upload

pub mod capture;
pub mod registration;
pub mod types;

pub use capture::{capture_filename, CaptureError, FileFrameSource, Frame, FrameSource, Uptime};
pub use registration::{register_module, Registration, RegistrationError};
pub use types::{Circle, DetectionReport, UploadError, UploadPayload, UploadReceipt};

use std::time::{Duration, Instant};

use chrono::{Datelike, Local};

use crate::config::NodeConfig;
use crate::http::multipart::{Boundary, MultipartEnvelope};
use crate::http::transport::{OutboundConnection, TransportSettings};
use crate::http::url::EndpointAddress;
use crate::net::{Connect, TcpConnector};
use crate::observability::metrics::record_upload;

/// Wall-clock years before this are treated as an unsynchronized clock.
const MIN_VALID_YEAR: i32 = 2020;

/// Captures frames and posts them to the collector over one reusable
/// connection.
pub struct Uploader<C: Connect> {
    connection: OutboundConnection<C>,
    device_id: u64,
    battery_fraction: f32,
    uptime: Uptime,
}

impl Uploader<TcpConnector> {
    pub fn from_config(config: &NodeConfig) -> Self {
        let connector = TcpConnector::new(Duration::from_millis(config.upload.connect_timeout_ms));
        Self::new(
            connector,
            TransportSettings::from_config(&config.upload),
            config.device.device_id,
            config.device.battery_fraction(),
        )
    }
}

impl<C: Connect> Uploader<C> {
    pub fn new(connector: C, settings: TransportSettings, device_id: u64, battery_fraction: f32) -> Self {
        Self {
            connection: OutboundConnection::new(connector, settings),
            device_id,
            battery_fraction,
            uptime: Uptime::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Capture one frame and post it to `upload_url`.
    pub async fn post_image<S: FrameSource>(
        &mut self,
        source: &mut S,
        upload_url: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let started = Instant::now();
        let result = self.upload_once(source, upload_url).await;

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    status = receipt.status,
                    bytes_sent = receipt.bytes_sent,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upload complete"
                );
                record_upload("ok", started, receipt.bytes_sent);
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Upload failed");
                record_upload(e.kind(), started, 0);
            }
        }

        result
    }

    async fn upload_once<S: FrameSource>(
        &mut self,
        source: &mut S,
        upload_url: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let image = source.capture()?;
        let payload = UploadPayload {
            device_id: self.device_id,
            battery_fraction: self.battery_fraction,
            filename: capture_filename(wall_clock(), self.uptime.millis()),
            image,
        };
        tracing::debug!(filename = %payload.filename, bytes = payload.image.len(), "Frame ready");

        let endpoint = EndpointAddress::parse(upload_url)?;
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::generate());
        let delivery = self.connection.send(&endpoint, &envelope).await?;

        let report = parse_report(&delivery.response.body);
        Ok(UploadReceipt {
            status: delivery.response.status,
            bytes_sent: delivery.bytes_sent,
            report,
        })
    }
}

fn wall_clock() -> Option<chrono::DateTime<Local>> {
    let now = Local::now();
    (now.year() >= MIN_VALID_YEAR).then_some(now)
}

fn parse_report(body: &[u8]) -> Option<DetectionReport> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match DetectionReport::parse(body) {
        Ok(report) => {
            for circle in &report.circles {
                tracing::info!(
                    radius = circle.radius,
                    status = %circle.status,
                    x = circle.x,
                    y = circle.y,
                    "Circle detected"
                );
            }
            if let Some(message) = &report.message {
                tracing::info!(message = %message, "Collector message");
            }
            Some(report)
        }
        Err(e) => {
            tracing::warn!(error = %e, body = %String::from_utf8_lossy(body), "Unparseable collector response");
            None
        }
    }
}
