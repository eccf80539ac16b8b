//! Camera node: periodic image upload over a hand-rolled HTTP/1.1 client, and
//! a first-time setup portal served by a hand-rolled HTTP/1.1 server.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod portal;
pub mod upload;

pub use config::schema::NodeConfig;
pub use lifecycle::Shutdown;
pub use portal::Portal;
pub use upload::Uploader;
