//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! node settings (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NodeConfig (validated, immutable)
//!
//! device record (JSON, edited through the portal)
//!     → store.rs (ConfigStore: load / save / configured marker)
//!     → record.rs (ConfigRecord ⇄ DeviceConfig, pure conversions)
//! ```
//!
//! # Design Decisions
//! - Node settings are immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The device record is only mutated by a validated portal submission

pub mod loader;
pub mod record;
pub mod schema;
pub mod store;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use record::{ConfigRecord, DeviceConfig, Resolution};
pub use schema::NodeConfig;
pub use schema::{CaptureConfig, DeviceSettings, ObservabilityConfig, PortalConfig, UploadConfig};
pub use store::{ConfigStore, FileConfigStore, StoreError};
