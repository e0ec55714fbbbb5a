//! hoodproxy: a minimal TCP forwarding proxy
//!
//! The proxy listens on a local address and, for every accepted client,
//! opens a matching connection to a fixed destination and relays bytes in
//! both directions until either side closes or the proxy is stopped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hoodproxy::{AddressSpec, ProxyServer, Result};
//! use hoodproxy::config::ProxyConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let listen = AddressSpec::new("127.0.0.1", 18080)?;
//!     let destination = AddressSpec::new("127.0.0.1", 9000)?;
//!     let config = Arc::new(ProxyConfig::new(&listen, &destination));
//!
//!     let proxy = ProxyServer::new(listen, destination, config);
//!     proxy.run()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     proxy.stop().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use common::{AddressSpec, ProxyError, Result};
pub use proxy::ProxyServer;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
