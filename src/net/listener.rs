//! TCP listener for the setup portal.
//!
//! The portal answers one client at a time, so there is no connection
//! limit here; a slow client only delays the next accept.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::PortalConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("portal address {address:?} is not a socket address")]
    Address { address: String },

    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

/// Listening socket of the portal.
pub struct PortalListener {
    inner: TcpListener,
    local: SocketAddr,
}

impl PortalListener {
    /// Listen on `portal.bind_address`. Port 0 picks a free port.
    pub async fn bind(config: &PortalConfig) -> Result<Self, ListenerError> {
        let address: SocketAddr = config.bind_address.parse().map_err(|_| ListenerError::Address {
            address: config.bind_address.clone(),
        })?;

        let bind_error = |source| ListenerError::Bind { address, source };
        let inner = TcpListener::bind(address).await.map_err(bind_error)?;
        let local = inner.local_addr().map_err(bind_error)?;

        tracing::info!(address = %local, "Portal listening");
        Ok(Self { inner, local })
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer = %peer, "Portal client connected");
        Ok((stream, peer))
    }

    /// Address actually bound, with the chosen port resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> PortalConfig {
        PortalConfig {
            bind_address: address.to_string(),
            ..PortalConfig::default()
        }
    }

    #[tokio::test]
    async fn test_accepts_client_on_ephemeral_port() {
        let listener = PortalListener::bind(&config("127.0.0.1:0")).await.unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        assert!(client.is_ok());
        let (_, peer) = accepted.unwrap();
        assert!(peer.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_unparseable_address() {
        let err = PortalListener::bind(&config("portal.local")).await.err().unwrap();
        assert!(matches!(err, ListenerError::Address { .. }));
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let first = PortalListener::bind(&config("127.0.0.1:0")).await.unwrap();
        let taken = first.local_addr().to_string();
        let err = PortalListener::bind(&config(&taken)).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
