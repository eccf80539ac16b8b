//! Outbound stream establishment.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::http::url::EndpointAddress;

/// Opens a byte stream to an endpoint.
pub trait Connect {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self, endpoint: &EndpointAddress) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connector with a bounded connect phase.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &EndpointAddress) -> io::Result<TcpStream> {
        let authority = endpoint.authority();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(authority.as_str()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connect to {} timed out", authority)))??;

        // Small header writes must not wait on Nagle before the image follows.
        stream.set_nodelay(true)?;

        tracing::debug!(endpoint = %authority, "Connected");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connects_to_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = EndpointAddress::parse(&format!("http://127.0.0.1:{}/upload", port)).unwrap();

        let connector = TcpConnector::new(Duration::from_secs(2));
        let (stream, accepted) = tokio::join!(connector.connect(&endpoint), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = EndpointAddress::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let connector = TcpConnector::new(Duration::from_secs(2));
        assert!(connector.connect(&endpoint).await.is_err());
    }
}
