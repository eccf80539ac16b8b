//! Outbound HTTP/1.1 transport over a reusable connection.
//!
//! # Responsibilities
//! - Open the connection lazily and reuse it across uploads
//! - Frame the request line and headers around a multipart envelope
//! - Stream the image in bounded chunks, resuming partial writes
//! - Hand the stream to the response reader
//!
//! # Design Decisions
//! - A write that transfers zero bytes, fails, or stalls past the write
//!   timeout aborts the exchange
//! - Any failed exchange, non-2xx answer, or peer close drops the connection;
//!   only a clean 2xx on a live stream keeps it for the next call
//! - A kept stream is checked without blocking before reuse; one the peer
//!   closed while idle is replaced by a fresh connection
//! - No retry at this layer; the caller retries on its own interval

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::config::UploadConfig;
use crate::http::multipart::MultipartEnvelope;
use crate::http::response::{read_response, RawResponse, ResponseLimits};
use crate::http::url::EndpointAddress;
use crate::net::Connect;
use crate::upload::UploadError;

/// Timing and sizing of one exchange.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// Largest slice of image data handed to a single write.
    pub chunk_size: usize,
    pub write_timeout: Duration,
    pub response: ResponseLimits,
}

impl TransportSettings {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            write_timeout: Duration::from_millis(config.write_timeout_ms),
            response: ResponseLimits {
                idle_timeout: Duration::from_millis(config.response_idle_ms),
                max_line_bytes: config.max_line_bytes,
                max_body_bytes: config.max_response_bytes,
            },
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

/// A completed exchange with a 2xx answer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub response: RawResponse,
    /// Request bytes written, headers included.
    pub bytes_sent: u64,
}

/// The single outbound connection of the node.
pub struct OutboundConnection<C: Connect> {
    connector: C,
    stream: Option<BufReader<C::Stream>>,
    settings: TransportSettings,
}

impl<C: Connect> OutboundConnection<C> {
    pub fn new(connector: C, settings: TransportSettings) -> Self {
        Self {
            connector,
            stream: None,
            settings,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Drop the current stream, if any.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Outbound connection closed");
        }
    }

    /// POST `envelope` to `endpoint` and read the answer.
    pub async fn send(
        &mut self,
        endpoint: &EndpointAddress,
        envelope: &MultipartEnvelope<'_>,
    ) -> Result<Delivery, UploadError> {
        let result = self.exchange(endpoint, envelope).await;

        let keep = matches!(&result, Ok(d) if d.response.is_success() && !d.response.peer_closed);
        if !keep {
            self.close();
        }

        let delivery = result?;
        if !delivery.response.is_success() {
            tracing::warn!(
                endpoint = %endpoint,
                status = delivery.response.status,
                body = %delivery.response.body_text(),
                "Collector rejected upload"
            );
            return Err(UploadError::NonSuccessStatus(delivery.response.status));
        }
        Ok(delivery)
    }

    async fn exchange(
        &mut self,
        endpoint: &EndpointAddress,
        envelope: &MultipartEnvelope<'_>,
    ) -> Result<Delivery, UploadError> {
        let settings = self.settings;
        let stream = self.ensure_connected(endpoint).await?;

        let head = request_head(endpoint, envelope);
        let mut sent = 0u64;

        write_fully(stream, head.as_bytes(), settings.write_timeout, &mut sent).await?;
        write_fully(stream, envelope.head(), settings.write_timeout, &mut sent).await?;
        for chunk in envelope.image().chunks(settings.chunk_size.max(1)) {
            write_fully(stream, chunk, settings.write_timeout, &mut sent).await?;
        }
        write_fully(stream, envelope.tail(), settings.write_timeout, &mut sent).await?;

        match timeout(settings.write_timeout, stream.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(write_error(sent, e.to_string())),
            Err(_) => return Err(write_error(sent, "flush timed out".to_string())),
        }

        tracing::debug!(endpoint = %endpoint, bytes_sent = sent, "Request sent");

        let response = read_response(stream, &settings.response).await?;
        Ok(Delivery {
            response,
            bytes_sent: sent,
        })
    }

    async fn ensure_connected(&mut self, endpoint: &EndpointAddress) -> Result<&mut BufReader<C::Stream>, UploadError> {
        let kept = match self.stream.take() {
            Some(mut stream) => {
                if is_reusable(&mut stream).await {
                    Some(stream)
                } else {
                    tracing::debug!(endpoint = %endpoint, "Kept connection went stale, reconnecting");
                    None
                }
            }
            None => None,
        };

        let stream = match kept {
            Some(stream) => stream,
            None => {
                let stream = self
                    .connector
                    .connect(endpoint)
                    .await
                    .map_err(|source| UploadError::Connect {
                        endpoint: endpoint.authority(),
                        source,
                    })?;
                BufReader::new(stream)
            }
        };
        Ok(self.stream.insert(stream))
    }
}

/// Whether an idle kept stream can carry another request.
///
/// A pending read means the peer is still there. EOF, a read error or
/// unsolicited bytes all rule the stream out.
async fn is_reusable<S>(stream: &mut BufReader<S>) -> bool
where
    S: AsyncRead + Unpin,
{
    matches!(timeout(Duration::ZERO, stream.fill_buf()).await, Err(_))
}

/// Request line and headers, terminated by the blank line.
pub fn request_head(endpoint: &EndpointAddress, envelope: &MultipartEnvelope<'_>) -> String {
    format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: keep-alive\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\r\n",
        endpoint.path,
        endpoint.host,
        envelope.content_type(),
        envelope.content_length(),
    )
}

/// Write all of `data`, re-issuing the unsent remainder after partial writes.
async fn write_fully<W>(writer: &mut W, data: &[u8], limit: Duration, sent: &mut u64) -> Result<(), UploadError>
where
    W: AsyncWrite + Unpin,
{
    let mut remaining = data;
    while !remaining.is_empty() {
        let written = match timeout(limit, writer.write(remaining)).await {
            Ok(Ok(0)) => return Err(write_error(*sent, "zero-length write".to_string())),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(write_error(*sent, e.to_string())),
            Err(_) => return Err(write_error(*sent, format!("write stalled for {:?}", limit))),
        };
        remaining = &remaining[written..];
        *sent += written as u64;
    }
    Ok(())
}

fn write_error(sent: u64, reason: String) -> UploadError {
    tracing::warn!(bytes_sent = sent, reason = %reason, "Transport write failed");
    UploadError::TransportWrite { sent, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::Boundary;
    use crate::upload::{Frame, UploadPayload};
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, DuplexStream, ReadBuf};

    /// Stream that accepts a limited number of bytes per write and replays a
    /// canned response.
    struct ScriptedStream {
        written: Arc<Mutex<Vec<u8>>>,
        max_per_write: usize,
        write_budget: usize,
        response: Vec<u8>,
        read_pos: usize,
    }

    impl AsyncRead for ScriptedStream {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let rest = &this.response[this.read_pos..];
            let n = rest.len().min(buf.remaining());
            buf.put_slice(&rest[..n]);
            this.read_pos += n;
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for ScriptedStream {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = buf.len().min(this.max_per_write).min(this.write_budget);
            this.write_budget -= n;
            this.written.lock().unwrap().extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct ScriptedConnector {
        written: Arc<Mutex<Vec<u8>>>,
        connects: Arc<AtomicUsize>,
        max_per_write: usize,
        write_budget: usize,
        response: &'static [u8],
    }

    impl ScriptedConnector {
        fn new(max_per_write: usize, write_budget: usize, response: &'static [u8]) -> Self {
            Self {
                written: Arc::new(Mutex::new(Vec::new())),
                connects: Arc::new(AtomicUsize::new(0)),
                max_per_write,
                write_budget,
                response,
            }
        }
    }

    impl Connect for ScriptedConnector {
        type Stream = ScriptedStream;

        async fn connect(&self, _endpoint: &EndpointAddress) -> io::Result<ScriptedStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedStream {
                written: self.written.clone(),
                max_per_write: self.max_per_write,
                write_budget: self.write_budget,
                response: self.response.to_vec(),
                read_pos: 0,
            })
        }
    }

    /// Connector whose peer answers every request and keeps the stream open.
    struct EchoConnector {
        connects: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Connect for EchoConnector {
        type Stream = DuplexStream;

        async fn connect(&self, _endpoint: &EndpointAddress) -> io::Result<DuplexStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (client, server) = tokio::io::duplex(64 * 1024);
            tokio::spawn(answer_requests(server, self.requests.clone()));
            Ok(client)
        }
    }

    async fn answer_requests(server: DuplexStream, requests: Arc<Mutex<Vec<Vec<u8>>>>) {
        let mut server = tokio::io::BufReader::new(server);
        loop {
            let mut request = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if server.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                request.extend_from_slice(line.as_bytes());
                if let Some(value) = line.strip_prefix("Content-Length: ") {
                    content_length = value.trim().parse().unwrap();
                }
                if line == "\r\n" {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            server.read_exact(&mut body).await.unwrap();
            request.extend_from_slice(&body);
            requests.lock().unwrap().push(request);
            server.get_mut().write_all(b"HTTP/1.1 200 OK\r\n\r\nOK").await.unwrap();
        }
    }

    /// Connector whose peer answers requests for a while, then hangs up on an
    /// idle stream.
    struct HangUpConnector {
        connects: Arc<AtomicUsize>,
        linger: Duration,
    }

    impl Connect for HangUpConnector {
        type Stream = DuplexStream;

        async fn connect(&self, _endpoint: &EndpointAddress) -> io::Result<DuplexStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (client, server) = tokio::io::duplex(64 * 1024);
            let linger = self.linger;
            tokio::spawn(async move {
                let requests = Arc::new(Mutex::new(Vec::new()));
                let _ = tokio::time::timeout(linger, answer_requests(server, requests)).await;
            });
            Ok(client)
        }
    }

    fn endpoint() -> EndpointAddress {
        EndpointAddress::parse("http://collector.local:8080/upload").unwrap()
    }

    fn payload(size: usize) -> UploadPayload {
        UploadPayload {
            device_id: 7,
            battery_fraction: 0.9,
            image: Frame::new((0..size).map(|i| (i % 251) as u8).collect()),
            filename: "esp_capture_test.jpg".to_string(),
        }
    }

    fn settings(idle_ms: u64) -> TransportSettings {
        TransportSettings {
            chunk_size: 64,
            write_timeout: Duration::from_secs(1),
            response: ResponseLimits {
                idle_timeout: Duration::from_millis(idle_ms),
                ..ResponseLimits::default()
            },
        }
    }

    #[tokio::test]
    async fn test_partial_writes_are_resumed() {
        let connector = ScriptedConnector::new(7, usize::MAX, b"HTTP/1.1 201 Created\r\n\r\nOK");
        let written = connector.written.clone();
        let mut connection = OutboundConnection::new(connector, settings(200));

        let payload = payload(1000);
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::from_token("bnd"));
        let delivery = connection.send(&endpoint(), &envelope).await.unwrap();

        let mut expected = request_head(&endpoint(), &envelope).into_bytes();
        expected.extend_from_slice(envelope.head());
        expected.extend_from_slice(envelope.image());
        expected.extend_from_slice(envelope.tail());

        assert_eq!(delivery.response.status, 201);
        assert_eq!(*written.lock().unwrap(), expected);
        assert_eq!(delivery.bytes_sent, expected.len() as u64);
    }

    #[tokio::test]
    async fn test_zero_length_write_mid_image_aborts_and_closes() {
        let releases = Arc::new(AtomicUsize::new(0));
        let released = releases.clone();
        let payload = UploadPayload {
            image: Frame::with_release(vec![0x5A; 4096], move || {
                released.fetch_add(1, Ordering::SeqCst);
            }),
            ..payload(0)
        };
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::from_token("bnd"));
        let headers = request_head(&endpoint(), &envelope).len() + envelope.head().len();
        let budget = headers + 100;

        let connector = ScriptedConnector::new(usize::MAX, budget, b"");
        let written = connector.written.clone();
        let mut connection = OutboundConnection::new(connector, settings(200));
        let err = connection.send(&endpoint(), &envelope).await.unwrap_err();

        assert!(matches!(err, UploadError::TransportWrite { sent, .. } if sent == budget as u64));
        assert_eq!(err.code(), -3);
        assert!(!connection.is_connected());
        assert_eq!(&written.lock().unwrap()[headers..], &[0x5A; 100][..]);

        drop(envelope);
        drop(payload);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_closes_connection() {
        let connector = ScriptedConnector::new(usize::MAX, usize::MAX, b"HTTP/1.1 500 Internal Server Error\r\n\r\n");
        let mut connection = OutboundConnection::new(connector, settings(200));

        let payload = payload(10);
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::from_token("bnd"));
        let err = connection.send(&endpoint(), &envelope).await.unwrap_err();

        assert_eq!(err.code(), 500);
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_malformed_status_line() {
        let connector = ScriptedConnector::new(usize::MAX, usize::MAX, b"garbage\r\n\r\n");
        let mut connection = OutboundConnection::new(connector, settings(200));

        let payload = payload(10);
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::from_token("bnd"));
        let err = connection.send(&endpoint(), &envelope).await.unwrap_err();

        assert_eq!(err.code(), -4);
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_live_connection_is_reused() {
        let connects = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connector = EchoConnector {
            connects: connects.clone(),
            requests: requests.clone(),
        };
        let mut connection = OutboundConnection::new(connector, settings(100));

        for size in [0usize, 300] {
            let payload = payload(size);
            let envelope = MultipartEnvelope::for_upload(&payload, Boundary::generate());
            let delivery = connection.send(&endpoint(), &envelope).await.unwrap();
            assert_eq!(delivery.response.body, b"OK");
            assert!(connection.is_connected());
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with(b"POST /upload HTTP/1.1\r\nHost: collector.local\r\n"));
    }

    #[tokio::test]
    async fn test_idle_hang_up_reconnects() {
        let connects = Arc::new(AtomicUsize::new(0));
        let connector = HangUpConnector {
            connects: connects.clone(),
            linger: Duration::from_millis(250),
        };
        let mut connection = OutboundConnection::new(connector, settings(50));

        let payload = payload(100);
        let envelope = MultipartEnvelope::for_upload(&payload, Boundary::generate());
        connection.send(&endpoint(), &envelope).await.unwrap();
        assert!(connection.is_connected());

        tokio::time::sleep(Duration::from_millis(400)).await;

        let delivery = connection.send(&endpoint(), &envelope).await.unwrap();
        assert_eq!(delivery.response.status, 200);
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_peer_close_forces_reconnect() {
        let connector = ScriptedConnector::new(usize::MAX, usize::MAX, b"HTTP/1.1 200 OK\r\n\r\ndone");
        let connects = connector.connects.clone();
        let mut connection = OutboundConnection::new(connector, settings(200));

        for _ in 0..2 {
            let payload = payload(10);
            let envelope = MultipartEnvelope::for_upload(&payload, Boundary::generate());
            connection.send(&endpoint(), &envelope).await.unwrap();
            assert!(!connection.is_connected());
        }
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }
}
