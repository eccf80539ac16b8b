//! Collector response reading.
//!
//! # Responsibilities
//! - Read and validate the status line
//! - Skip header lines up to the blank line
//! - Collect the body until the peer closes or goes idle
//!
//! # Design Decisions
//! - No `Content-Length` is assumed on responses; the body ends at EOF or
//!   after `idle_timeout` without new bytes
//! - Silence before the headers are complete is a `Timeout`; silence in the
//!   body only ends the body
//! - A body ended by EOF marks the connection as closed by the peer, so it
//!   is not reused
//! - Memory is bounded: long lines are truncated and body bytes past the
//!   limit are drained and dropped

use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::timeout;

const STATUS_PREFIXES: [&str; 2] = ["HTTP/1.1 ", "HTTP/1.0 "];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("peer idle for {0:?} before headers completed")]
    Timeout(Duration),
}

/// Bounds applied while reading a response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLimits {
    pub idle_timeout: Duration,
    pub max_line_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ResponseLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(5000),
            max_line_bytes: 1024,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Status code and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_line: String,
    pub body: Vec<u8>,
    /// The peer closed or reset the stream while the body was read.
    pub peer_closed: bool,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnd {
    Newline,
    Eof,
}

/// Read one response from `reader`.
pub async fn read_response<R>(reader: &mut R, limits: &ResponseLimits) -> Result<RawResponse, ResponseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let end = read_line(reader, limits, &mut line).await?;
    let status_line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_string();
    if end == LineEnd::Eof {
        return Err(ResponseError::MalformedStatusLine(status_line));
    }
    let status = parse_status_line(&status_line)?;

    let headers_end = loop {
        line.clear();
        let end = read_line(reader, limits, &mut line).await?;
        if end == LineEnd::Eof || line.is_empty() || line == b"\r" {
            break end;
        }
    };

    let (body, peer_closed) = if headers_end == LineEnd::Eof {
        (Vec::new(), true)
    } else {
        read_body(reader, limits).await
    };
    tracing::debug!(status, body_bytes = body.len(), peer_closed, "Response read");

    Ok(RawResponse {
        status,
        status_line,
        body,
        peer_closed,
    })
}

/// Extract the three-digit code from an `HTTP/1.x NNN reason` line.
pub fn parse_status_line(line: &str) -> Result<u16, ResponseError> {
    let malformed = || ResponseError::MalformedStatusLine(line.to_string());

    let rest = STATUS_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .ok_or_else(malformed)?;

    let code = rest.get(..3).ok_or_else(malformed)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if rest.len() > 3 && !rest[3..].starts_with(' ') {
        return Err(malformed());
    }
    code.parse().map_err(|_| malformed())
}

/// Read up to and excluding `\n`, keeping at most `max_line_bytes`.
async fn read_line<R>(reader: &mut R, limits: &ResponseLimits, line: &mut Vec<u8>) -> Result<LineEnd, ResponseError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = match timeout(limits.idle_timeout, reader.fill_buf()).await {
            Err(_) => return Err(ResponseError::Timeout(limits.idle_timeout)),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Read failed while waiting for headers");
                return Ok(LineEnd::Eof);
            }
            Ok(Ok(available)) => available,
        };
        if available.is_empty() {
            return Ok(LineEnd::Eof);
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let content = &available[..newline.unwrap_or(available.len())];
        let room = limits.max_line_bytes.saturating_sub(line.len());
        line.extend_from_slice(&content[..content.len().min(room)]);

        let consumed = newline.map_or(available.len(), |pos| pos + 1);
        reader.consume(consumed);
        if newline.is_some() {
            return Ok(LineEnd::Newline);
        }
    }
}

/// Read until EOF, a read error, or `idle_timeout` without data.
///
/// Returns the body and whether the stream ended on the peer's side.
async fn read_body<R>(reader: &mut R, limits: &ResponseLimits) -> (Vec<u8>, bool)
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        match timeout(limits.idle_timeout, reader.read(&mut buf)).await {
            Err(_) => {
                tracing::debug!(idle = ?limits.idle_timeout, "Response idle, ending body");
                return (body, false);
            }
            Ok(Ok(0)) => return (body, true),
            Ok(Ok(n)) => {
                let room = limits.max_body_bytes.saturating_sub(body.len());
                body.extend_from_slice(&buf[..n.min(room)]);
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Read failed, ending body");
                return (body, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn limits(idle_ms: u64) -> ResponseLimits {
        ResponseLimits {
            idle_timeout: Duration::from_millis(idle_ms),
            ..ResponseLimits::default()
        }
    }

    #[tokio::test]
    async fn test_status_and_body_until_close() {
        let mut reader: &[u8] = b"HTTP/1.1 201 Created\r\n\r\nOK";
        let response = read_response(&mut reader, &limits(1000)).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"OK");
        assert_eq!(response.status_line, "HTTP/1.1 201 Created");
        assert!(response.is_success());
        assert!(response.peer_closed);
    }

    #[tokio::test]
    async fn test_headers_are_discarded() {
        let mut reader: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nX-Long: abc\r\n\r\n{\"circles\":[]}";
        let response = read_response(&mut reader, &limits(1000)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "{\"circles\":[]}");
    }

    #[tokio::test]
    async fn test_bare_lf_lines() {
        let mut reader: &[u8] = b"HTTP/1.0 404 Not Found\nServer: x\n\nmissing";
        let response = read_response(&mut reader, &limits(1000)).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(response.body, b"missing");
    }

    #[tokio::test]
    async fn test_wrong_protocol_is_malformed() {
        let mut reader: &[u8] = b"SSH-2.0-OpenSSH_9.6\r\n";
        let err = read_response(&mut reader, &limits(1000)).await.unwrap_err();
        assert_eq!(err, ResponseError::MalformedStatusLine("SSH-2.0-OpenSSH_9.6".into()));
    }

    #[tokio::test]
    async fn test_close_before_status_line_is_malformed() {
        let mut reader: &[u8] = b"HTTP/1.1 20";
        let err = read_response(&mut reader, &limits(1000)).await.unwrap_err();
        assert!(matches!(err, ResponseError::MalformedStatusLine(_)));
    }

    #[tokio::test]
    async fn test_stalled_headers_time_out() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"HTTP/1.1 200 OK\r\nContent-Ty").await.unwrap();

        let mut reader = BufReader::new(client);
        let started = std::time::Instant::now();
        let err = read_response(&mut reader, &limits(150)).await.unwrap_err();
        assert_eq!(err, ResponseError::Timeout(Duration::from_millis(150)));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(server);
    }

    #[tokio::test]
    async fn test_idle_body_ends_without_error() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"HTTP/1.1 200 OK\r\n\r\npartial").await.unwrap();

        let mut reader = BufReader::new(client);
        let response = read_response(&mut reader, &limits(100)).await.unwrap();
        assert_eq!(response.body, b"partial");
        assert!(!response.peer_closed);
        drop(server);
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let mut raw = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        raw.extend(std::iter::repeat(b'x').take(5000));
        let mut reader: &[u8] = &raw;
        let limits = ResponseLimits {
            max_body_bytes: 100,
            ..limits(1000)
        };
        let response = read_response(&mut reader, &limits).await.unwrap();
        assert_eq!(response.body.len(), 100);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK"), Ok(200));
        assert_eq!(parse_status_line("HTTP/1.1 204"), Ok(204));
        assert!(parse_status_line("HTTP/2 200").is_err());
        assert!(parse_status_line("HTTP/1.1 2x0 OK").is_err());
        assert!(parse_status_line("HTTP/1.1 2000 OK").is_err());
        assert!(parse_status_line("").is_err());
    }
}
