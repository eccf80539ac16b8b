//! First-time setup portal.
//!
//! # Data Flow
//! ```text
//! PortalListener::accept
//!     → handle_connection (idle-bounded reads)
//!     → RequestParser (http/request.rs)
//!     → dispatch.rs (route + session guard + persistence)
//!     → page.rs (rendered form, 200 OK, Connection: close)
//!     → connection closed
//! ```
//!
//! # Design Decisions
//! - One request per connection and one connection at a time
//! - A client that goes silent, disconnects, or is still sending when the
//!   request deadline passes gets no response
//! - Oversized or malformed requests are answered with the form
//! - A successful `/save` ends the serving loop after its response

pub mod dispatch;
pub mod page;
pub mod session;

pub use dispatch::{dispatch, DispatchOutcome, Route};
pub use session::SessionToken;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::Instrument;

use crate::config::{ConfigStore, DeviceConfig, PortalConfig, StoreError};
use crate::http::request::{InboundRequest, ParseError, ParserLimits, RequestParser};
use crate::net::PortalListener;
use crate::observability::metrics::record_portal_request;
use crate::portal::page::{html_response, render_form};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Why the serving loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    Saved,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct PortalSettings {
    /// Longest silence tolerated while a request is incomplete.
    pub read_idle: Duration,
    /// Longest time a whole request may take to arrive.
    pub request_timeout: Duration,
    pub limits: ParserLimits,
}

impl PortalSettings {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            read_idle: Duration::from_millis(config.read_idle_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            limits: ParserLimits {
                max_line_bytes: config.max_line_bytes,
                max_header_bytes: config.max_header_bytes,
                max_body_bytes: config.max_body_bytes,
            },
        }
    }
}

/// Portal state for one run: the editable configuration, its store and the
/// session token of this run.
pub struct Portal<S: ConfigStore> {
    config: DeviceConfig,
    store: S,
    session: SessionToken,
    settings: PortalSettings,
    clients: u64,
}

impl<S: ConfigStore> Portal<S> {
    /// Load the stored configuration and start a new session.
    pub fn open(store: S, settings: PortalSettings) -> Result<Self, StoreError> {
        let config = store
            .load()?
            .map(|record| DeviceConfig::from_record(&record))
            .unwrap_or_default();
        Ok(Self::with_session(config, store, SessionToken::generate(), settings))
    }

    pub fn with_session(config: DeviceConfig, store: S, session: SessionToken, settings: PortalSettings) -> Self {
        Self {
            config,
            store,
            session,
            settings,
            clients: 0,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    /// Connections accepted so far in this run.
    pub fn clients_served(&self) -> u64 {
        self.clients
    }

    pub fn into_config(self) -> DeviceConfig {
        self.config
    }

    /// Serve clients until a submission is saved or shutdown is signalled.
    pub async fn serve(&mut self, listener: &PortalListener, shutdown: &mut broadcast::Receiver<()>) -> ServeOutcome {
        tracing::info!("Portal serving");
        tracing::debug!(session = %self.session.as_str(), "Portal session token");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    self.clients += 1;
                    let span = tracing::info_span!("portal_client", client = self.clients, peer = %peer);
                    if self.handle_connection(stream).instrument(span).await {
                        tracing::info!("Portal finished after save");
                        return ServeOutcome::Saved;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Portal shutting down");
                    return ServeOutcome::Shutdown;
                }
            }
        }
    }

    /// Read one request, answer it and close. Returns whether to stop serving.
    pub async fn handle_connection<T>(&mut self, mut stream: T) -> bool
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let parsed = match timeout(self.settings.request_timeout, read_request(&mut stream, &self.settings)).await {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return false,
            Err(_) => {
                tracing::debug!("Request still incomplete at deadline, closing without response");
                return false;
            }
        };

        let outcome = match parsed {
            Ok(request) => {
                tracing::debug!(method = ?request.method, path = %request.path(), "Request");
                dispatch(&request, &mut self.config, &mut self.store, &self.session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request, showing form");
                DispatchOutcome {
                    page: render_form(&self.config, &self.session, false),
                    route: Route::Invalid,
                    stop_after_response: false,
                }
            }
        };
        record_portal_request(outcome.route.label());

        let response = html_response(&outcome.page);
        match timeout(self.settings.read_idle, stream.write_all(&response)).await {
            Ok(Ok(())) => {
                let _ = stream.shutdown().await;
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to send response"),
            Err(_) => tracing::warn!("Timed out sending response"),
        }

        outcome.stop_after_response
    }
}

/// Read until the parser completes or fails.
///
/// `None` means the client went idle or disconnected first.
async fn read_request<T>(stream: &mut T, settings: &PortalSettings) -> Option<Result<InboundRequest, ParseError>>
where
    T: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new(settings.limits);
    let mut buf = [0u8; 512];

    loop {
        let n = match timeout(settings.read_idle, stream.read(&mut buf)).await {
            Err(_) => {
                tracing::debug!(state = ?parser.state(), "Client idle, closing without response");
                return None;
            }
            Ok(Ok(0)) => {
                tracing::debug!(state = ?parser.state(), "Client closed before request completed");
                return None;
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Read failed");
                return None;
            }
            Ok(Ok(n)) => n,
        };

        match parser.feed(&buf[..n]) {
            Ok(_) if parser.is_complete() => return Some(parser.finish()),
            Ok(_) => {}
            Err(e) => return Some(Err(e)),
        }
    }
}
