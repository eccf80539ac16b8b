//! Startup orchestration.
//!
//! # Responsibilities
//! - Run the setup portal when the device is not configured yet
//! - Announce the module to the collector
//! - Drive the capture/upload loop on the configured interval
//!
//! # Design Decisions
//! - Fail fast on startup errors (listener bind, unreadable record)
//! - Upload and registration failures are logged and never end the loop

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::{ConfigStore, DeviceConfig, FileConfigStore, NodeConfig, StoreError};
use crate::lifecycle::Shutdown;
use crate::net::{Connect, ListenerError, PortalListener};
use crate::portal::{Portal, PortalSettings, ServeOutcome};
use crate::upload::{register_module, FileFrameSource, FrameSource, Registration, Uploader};

/// Shortest pause between two uploads.
const MIN_CAPTURE_INTERVAL_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("portal listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("device record: {0}")]
    Store(#[from] StoreError),
}

/// Run the node: portal if needed, then registration and the upload loop.
pub async fn run_node(config: &NodeConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let mut signal = shutdown.subscribe();
    let store = FileConfigStore::from_settings(&config.device);

    let device = if store.is_configured() {
        load_device_config(&store)?
    } else {
        tracing::info!("Device not configured, starting portal");
        match run_portal(config, store, &mut signal).await? {
            Some(device) => device,
            None => return Ok(()),
        }
    };

    register(config, &device).await;

    let mut uploader = Uploader::from_config(config);
    let mut source = FileFrameSource::new(&config.capture.image_path);
    run_uploads(&mut uploader, &mut source, &device, &mut signal).await;
    Ok(())
}

/// Stored device configuration, or defaults when nothing was saved.
pub fn load_device_config<S: ConfigStore>(store: &S) -> Result<DeviceConfig, StoreError> {
    let device = store
        .load()?
        .map(|record| DeviceConfig::from_record(&record))
        .unwrap_or_default();
    tracing::info!(
        module_name = %device.module_name,
        upload_url = %device.upload_url,
        interval_ms = device.capture_interval_ms,
        resolution = ?device.resolution(),
        vertical_flip = device.vertical_flip,
        brightness = device.brightness,
        saturation = device.saturation,
        "Device configuration loaded"
    );
    Ok(device)
}

/// Serve the portal until a configuration is saved.
///
/// Returns `None` when shutdown interrupted the portal.
pub async fn run_portal<S: ConfigStore>(
    config: &NodeConfig,
    store: S,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<Option<DeviceConfig>, StartupError> {
    let listener = PortalListener::bind(&config.portal).await?;
    let mut portal = Portal::open(store, PortalSettings::from_config(&config.portal))?;

    match portal.serve(&listener, shutdown).await {
        ServeOutcome::Saved => Ok(Some(portal.into_config())),
        ServeOutcome::Shutdown => Ok(None),
    }
}

async fn register(config: &NodeConfig, device: &DeviceConfig) {
    let registration = Registration::new(&config.device, device);
    let client = reqwest::Client::new();
    match register_module(&client, &device.init_url, &registration).await {
        Ok(status) => tracing::info!(status, "Module registered"),
        Err(e) => tracing::warn!(error = %e, "Module registration failed"),
    }
}

/// Capture and upload every `capture_interval_ms` until shutdown.
///
/// Returns the number of successful uploads.
pub async fn run_uploads<C, S>(
    uploader: &mut Uploader<C>,
    source: &mut S,
    device: &DeviceConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> u64
where
    C: Connect,
    S: FrameSource,
{
    let interval = Duration::from_millis(
        u64::try_from(device.capture_interval_ms)
            .unwrap_or(0)
            .max(MIN_CAPTURE_INTERVAL_MS),
    );
    tracing::info!(interval_ms = interval.as_millis() as u64, url = %device.upload_url, "Upload loop started");

    let mut delivered = 0;
    loop {
        if uploader.post_image(source, &device.upload_url).await.is_ok() {
            delivered += 1;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::info!(delivered, "Upload loop stopped");
                return delivered;
            }
        }
    }
}
