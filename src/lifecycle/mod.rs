//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → not configured? run portal → register → upload loop
//!
//! Shutdown (shutdown.rs):
//!     Signal received → portal stops accepting / upload loop stops waiting → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: settings first, then portal, then network work
//! - An upload in flight is allowed to finish; shutdown is observed between
//!   uploads

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{load_device_config, run_node, run_portal, run_uploads, StartupError};
