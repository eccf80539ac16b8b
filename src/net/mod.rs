//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (upload)
//!     → connector.rs (Connect: open a stream to host:port)
//!     → http/transport.rs (request framing over the stream)
//!
//! Inbound (portal)
//!     → listener.rs (accept loop)
//!     → portal (request parsing and dispatch)
//! ```
//!
//! # Design Decisions
//! - Stream establishment sits behind a trait so the transport can run over
//!   in-memory streams in tests
//! - The portal serves one client at a time, so the listener has no
//!   connection limit

pub mod connector;
pub mod listener;

pub use connector::{Connect, TcpConnector};
pub use listener::{ListenerError, PortalListener};
