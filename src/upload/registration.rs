//! Announces a newly configured module to the collector.
//!
//! Sent once per start through a library HTTP client; failures are reported
//! to the caller, who only logs them.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::{DeviceConfig, DeviceSettings};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("no init URL configured")]
    MissingUrl,

    #[error("registration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector answered registration with status {0}")]
    Status(u16),
}

/// JSON body of the registration request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub esp_id: String,
    pub module_name: String,
    pub battery_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Registration {
    pub fn new(settings: &DeviceSettings, config: &DeviceConfig) -> Self {
        Self {
            esp_id: settings.device_id.to_string(),
            module_name: config.module_name.clone(),
            battery_level: settings.battery_percent.min(100),
            latitude: settings.latitude,
            longitude: settings.longitude,
        }
    }
}

/// POST `registration` to `init_url`; returns the response status.
pub async fn register_module(
    client: &reqwest::Client,
    init_url: &str,
    registration: &Registration,
) -> Result<u16, RegistrationError> {
    if init_url.trim().is_empty() {
        return Err(RegistrationError::MissingUrl);
    }

    let response = client
        .post(init_url)
        .timeout(Duration::from_secs(10))
        .json(registration)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::info!(status = status.as_u16(), response = %body, "Module registration answered");

    if !status.is_success() {
        return Err(RegistrationError::Status(status.as_u16()));
    }
    Ok(status.as_u16())
}
