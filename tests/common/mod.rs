//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A request as seen by the mock collector.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers, CRLFs included.
    pub head: String,
    /// Value of the `Content-Length` header.
    pub content_length: usize,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// What the mock collector does after reading a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send a full response, then close or keep the connection.
    Respond {
        status_line: &'static str,
        body: String,
        close: bool,
    },
    /// Send a full response, keep the connection idle for a while, then
    /// close it.
    Linger {
        status_line: &'static str,
        body: String,
        close_after: Duration,
    },
    /// Send these bytes and then go silent without closing.
    Stall(&'static str),
}

impl Reply {
    pub fn created(body: &str) -> Self {
        Reply::Respond {
            status_line: "HTTP/1.1 201 Created",
            body: body.to_string(),
            close: true,
        }
    }

    pub fn keep_alive(status_line: &'static str, body: &str) -> Self {
        Reply::Respond {
            status_line,
            body: body.to_string(),
            close: false,
        }
    }
}

pub struct MockCollector {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<CapturedRequest>,
    connections: Arc<AtomicUsize>,
}

impl MockCollector {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a programmable collector on an ephemeral port.
///
/// `reply` is called with the zero-based index of each request received.
pub async fn start_collector<F>(reply: F) -> MockCollector
where
    F: Fn(usize) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));
    let reply = Arc::new(reply);

    let accepted = connections.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(socket, tx.clone(), served.clone(), reply.clone()));
        }
    });

    MockCollector {
        addr,
        requests: rx,
        connections,
    }
}

async fn serve_connection<F>(
    socket: TcpStream,
    tx: mpsc::UnboundedSender<CapturedRequest>,
    served: Arc<AtomicUsize>,
    reply: Arc<F>,
) where
    F: Fn(usize) -> Reply + Send + Sync + 'static,
{
    let mut reader = BufReader::new(socket);
    loop {
        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if let Some((key, value)) = line.split_once(':') {
                if key.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            head.push_str(&line);
            if line == "\r\n" {
                break;
            }
        }

        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }
        let index = served.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(CapturedRequest {
            head,
            content_length,
            body,
        });

        match reply(index) {
            Reply::Respond {
                status_line,
                body,
                close,
            } => {
                let response = format!("{}\r\nContent-Type: application/json\r\n\r\n{}", status_line, body);
                if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                if close {
                    let _ = reader.get_mut().shutdown().await;
                    return;
                }
            }
            Reply::Linger {
                status_line,
                body,
                close_after,
            } => {
                let response = format!("{}\r\nContent-Type: application/json\r\n\r\n{}", status_line, body);
                let _ = reader.get_mut().write_all(response.as_bytes()).await;
                tokio::time::sleep(close_after).await;
                let _ = reader.get_mut().shutdown().await;
                return;
            }
            Reply::Stall(partial) => {
                let _ = reader.get_mut().write_all(partial.as_bytes()).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                return;
            }
        }
    }
}

/// Fresh, empty directory for one test.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("camera-node-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
