//! Metrics collection and exposition.
//!
//! # Metrics
//! - `camera_node_uploads_total` (counter): uploads by outcome (`ok` or error kind)
//! - `camera_node_upload_duration_seconds` (histogram): capture-to-response latency
//! - `camera_node_upload_bytes_total` (counter): request bytes written
//! - `camera_node_portal_requests_total` (counter): portal requests by route

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished upload.
pub fn record_upload(outcome: &'static str, started: Instant, bytes_sent: u64) {
    metrics::counter!("camera_node_uploads_total", "outcome" => outcome).increment(1);
    metrics::histogram!("camera_node_upload_duration_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("camera_node_upload_bytes_total").increment(bytes_sent);
}

/// Record one handled portal request.
pub fn record_portal_request(route: &'static str) {
    metrics::counter!("camera_node_portal_requests_total", "route" => route).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_upload("ok", Instant::now(), 128);
        record_portal_request("form");
    }
}
