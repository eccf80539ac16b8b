//! Configuration schema definitions.
//!
//! This module defines the node's own settings (listen address, protocol
//! limits, timeouts, device identity). The persisted device record edited
//! through the portal lives in [`crate::config::record`].
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the camera node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Configuration portal settings.
    pub portal: PortalConfig,

    /// Outbound upload settings.
    pub upload: UploadConfig,

    /// Device identity and persistence paths.
    pub device: DeviceSettings,

    /// Image source settings.
    pub capture: CaptureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Configuration portal (inbound HTTP server).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Longest accepted request or header line in bytes.
    pub max_line_bytes: usize,

    /// Largest accepted header block in bytes, line breaks excluded.
    pub max_header_bytes: usize,

    /// Largest accepted POST body in bytes.
    pub max_body_bytes: usize,

    /// Give up on a connection after this long without new bytes.
    pub read_idle_ms: u64,

    /// Give up on a connection whose request is still incomplete after this
    /// long, however steadily it trickles in.
    pub request_timeout_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            max_line_bytes: 2048,
            max_header_bytes: 8192,
            max_body_bytes: 4096,
            read_idle_ms: 5000,
            request_timeout_ms: 15000,
        }
    }
}

/// Outbound upload (multipart client) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest single write of image bytes.
    pub chunk_size: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for a single socket write in milliseconds.
    pub write_timeout_ms: u64,

    /// Stop reading the response after this long without new bytes.
    pub response_idle_ms: u64,

    /// Response body bytes kept in memory; the rest is drained and dropped.
    pub max_response_bytes: usize,

    /// Longest status or header line kept in memory.
    pub max_line_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            connect_timeout_ms: 8000,
            write_timeout_ms: 8000,
            response_idle_ms: 5000,
            max_response_bytes: 64 * 1024,
            max_line_bytes: 1024,
        }
    }
}

/// Device identity, telemetry and persistence locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Hardware identifier reported as the `mac` field.
    pub device_id: u64,

    /// Battery level in percent (0-100), reported as a fraction.
    pub battery_percent: u8,

    /// Path of the persisted device record (JSON).
    pub record_path: String,

    /// Path of the "device is configured" marker.
    pub configured_flag_path: String,

    /// Static coordinates reported at registration.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_id: 0,
            battery_percent: 90,
            record_path: "config.json".to_string(),
            configured_flag_path: "configured.flag".to_string(),
            latitude: None,
            longitude: None,
        }
    }
}

impl DeviceSettings {
    /// Battery level as a fraction in [0, 1].
    pub fn battery_fraction(&self) -> f32 {
        f32::from(self.battery_percent.min(100)) / 100.0
    }
}

/// Where captured frames come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JPEG file served as the captured frame.
    pub image_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_path: "capture.jpg".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
