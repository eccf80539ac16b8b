//! Upload target parsing.
//!
//! # Responsibilities
//! - Split an absolute (`https://host:port/path`) or scheme-less (`host/path`)
//!   URL into the host, port and path used to open a connection
//! - Degrade malformed input to best-effort substrings instead of failing
//!
//! # Design Decisions
//! - Port defaults follow the scheme: `http://` → 80, anything else → 443
//! - A port segment that does not parse to a non-zero `u16` falls back to the default
//! - The only rejected input is an empty host

use thiserror::Error;

use crate::http::form::parse_int;

/// Default port for plain `http://` targets.
pub const HTTP_PORT: u16 = 80;

/// Default port for every other target, including scheme-less ones.
pub const SECURE_PORT: u16 = 443;

const SCHEME_SEPARATOR: &str = "://";

/// Errors raised while parsing an upload target.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The authority section contained no host.
    #[error("URL has an empty host: {0:?}")]
    EmptyHost(String),
}

/// Resolved host/port/path triple for an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl EndpointAddress {
    /// Parse a URL string into an endpoint address.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let (scheme, rest) = match url.find(SCHEME_SEPARATOR) {
            Some(index) => (&url[..index], &url[index + SCHEME_SEPARATOR.len()..]),
            None => ("", url),
        };

        let (authority, path) = match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash..]),
            None => (rest, "/"),
        };

        let default_port = if scheme.eq_ignore_ascii_case("http") {
            HTTP_PORT
        } else {
            SECURE_PORT
        };

        let (host, port) = match authority.find(':') {
            Some(colon) => {
                let port = u16::try_from(parse_int(&authority[colon + 1..]))
                    .ok()
                    .filter(|port| *port != 0)
                    .unwrap_or(default_port);
                (&authority[..colon], port)
            }
            None => (authority, default_port),
        };

        if host.is_empty() {
            return Err(UrlError::EmptyHost(url.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port` pair for connecting.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}
