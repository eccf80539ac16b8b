//! Hand-rolled HTTP/1.1 protocol engine.
//!
//! # Data Flow
//! ```text
//! Outbound (upload)
//!     → url.rs (upload URL → EndpointAddress)
//!     → multipart.rs (head / image / tail, exact Content-Length)
//!     → transport.rs (request framing, chunked writes, connection reuse)
//!     → response.rs (status line, headers, idle-bounded body)
//!
//! Inbound (portal)
//!     → request.rs (byte-driven FSM: Line → Headers → Body → Dispatch)
//!     → form.rs (form decoding of query/body parameters)
//!     → [portal dispatcher]
//! ```

pub mod form;
pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;
pub mod url;

pub use multipart::{Boundary, MultipartEnvelope};
pub use request::{InboundRequest, Method, ParseError, ParseState, ParserLimits, RequestParser};
pub use response::{RawResponse, ResponseError, ResponseLimits};
pub use transport::{Delivery, OutboundConnection, TransportSettings};
pub use url::{EndpointAddress, UrlError};
