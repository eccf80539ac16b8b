//! Incremental parser for inbound portal requests.
//!
//! # Responsibilities
//! - Assemble the request line, header block and body from arbitrary chunks
//! - Track `Content-Length`; every other header is ignored
//! - Stop at exactly `Content-Length` body bytes
//!
//! # State Machine
//! ```text
//! Line ──request line──▶ Headers ──blank line, POST with body──▶ Body ──n bytes──▶ Dispatch
//!                           └──────────blank line otherwise──────────────────────────▲
//! ```
//!
//! # Design Decisions
//! - Driven by byte slices, independent of socket I/O
//! - `\r` is dropped from line content; `\n` ends a line
//! - Lines, the header block and bodies are bounded; exceeding a bound is an
//!   error, not a hang

use thiserror::Error;

use crate::http::form::parse_int;

const CONTENT_LENGTH: &str = "content-length:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("GET") {
            Method::Get
        } else if token.eq_ignore_ascii_case("POST") {
            Method::Post
        } else {
            Method::Other(token.to_string())
        }
    }
}

/// Parser position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Line,
    Headers,
    Body,
    Dispatch,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("request incomplete in state {0:?}")]
    Incomplete(ParseState),
}

#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub max_line_bytes: usize,
    /// Sum of all header line lengths.
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 2048,
            max_header_bytes: 8192,
            max_body_bytes: 4096,
        }
    }
}

/// A fully parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: Method,
    /// Request target as sent, query included.
    pub target: String,
    pub body: String,
    pub content_length: usize,
}

impl InboundRequest {
    /// Target without the query string.
    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(self.target.as_str(), |(path, _)| path)
    }

    /// Text after `?`, or empty.
    pub fn query(&self) -> &str {
        self.target.split_once('?').map_or("", |(_, query)| query)
    }
}

/// Byte-driven request state machine.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    limits: ParserLimits,
    line: Vec<u8>,
    method: Method,
    target: String,
    header_bytes: usize,
    content_length: usize,
    body: Vec<u8>,
}

impl RequestParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            state: ParseState::Line,
            limits,
            line: Vec::new(),
            method: Method::Other(String::new()),
            target: String::new(),
            header_bytes: 0,
            content_length: 0,
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Dispatch
    }

    /// Consume bytes from `data` until the request is complete.
    ///
    /// Returns how many bytes were consumed; bytes after the end of the
    /// request are left to the caller.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;

        while consumed < data.len() {
            match self.state {
                ParseState::Line | ParseState::Headers => {
                    let byte = data[consumed];
                    consumed += 1;
                    match byte {
                        b'\n' => self.end_line()?,
                        b'\r' => {}
                        _ => {
                            if self.line.len() >= self.limits.max_line_bytes {
                                return Err(ParseError::LineTooLong {
                                    limit: self.limits.max_line_bytes,
                                });
                            }
                            if self.state == ParseState::Headers {
                                self.header_bytes += 1;
                                if self.header_bytes > self.limits.max_header_bytes {
                                    return Err(ParseError::HeadersTooLarge {
                                        limit: self.limits.max_header_bytes,
                                    });
                                }
                            }
                            self.line.push(byte);
                        }
                    }
                }
                ParseState::Body => {
                    let wanted = self.content_length - self.body.len();
                    let take = wanted.min(data.len() - consumed);
                    self.body.extend_from_slice(&data[consumed..consumed + take]);
                    consumed += take;
                    if self.body.len() == self.content_length {
                        self.state = ParseState::Dispatch;
                    }
                }
                ParseState::Dispatch => break,
            }
        }

        Ok(consumed)
    }

    /// The parsed request; fails unless the parser reached `Dispatch`.
    pub fn finish(self) -> Result<InboundRequest, ParseError> {
        if self.state != ParseState::Dispatch {
            return Err(ParseError::Incomplete(self.state));
        }
        Ok(InboundRequest {
            method: self.method,
            target: self.target,
            body: String::from_utf8_lossy(&self.body).into_owned(),
            content_length: self.content_length,
        })
    }

    fn end_line(&mut self) -> Result<(), ParseError> {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        match self.state {
            ParseState::Line => {
                // Stray CRLFs before the request line are skipped.
                if line.is_empty() {
                    return Ok(());
                }
                let mut tokens = line.splitn(3, ' ');
                self.method = Method::from_token(tokens.next().unwrap_or_default());
                self.target = tokens.next().unwrap_or_default().to_string();
                self.state = ParseState::Headers;
            }
            ParseState::Headers if line.is_empty() => {
                if self.method == Method::Post && self.content_length > 0 {
                    if self.content_length > self.limits.max_body_bytes {
                        return Err(ParseError::BodyTooLarge {
                            length: self.content_length,
                            limit: self.limits.max_body_bytes,
                        });
                    }
                    self.state = ParseState::Body;
                } else {
                    self.state = ParseState::Dispatch;
                }
            }
            ParseState::Headers => {
                if let Some(value) = header_value(&line, CONTENT_LENGTH) {
                    self.content_length = usize::try_from(parse_int(value)).unwrap_or(0);
                }
            }
            ParseState::Body | ParseState::Dispatch => {}
        }
        Ok(())
    }
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let prefix = line.get(..name.len())?;
    prefix.eq_ignore_ascii_case(name).then(|| &line[name.len()..])
}
