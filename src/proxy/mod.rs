//! Proxy service module
//!
//! This module implements the core of the proxy: the acceptance loop, the
//! per-connection handler, and the per-direction forwarders.
//!
//! Every accepted client gets its own destination connection and two
//! forwarding tasks, one per direction. All tasks of one proxy share a
//! single stop signal.

pub mod server;
mod handler;
pub mod forwarder;

pub use server::{ProxyServer, ServerPhase};
pub use forwarder::{forward, ForwardEnd, ForwardOptions, ForwardSummary, TRAFFIC_LOG_TARGET};
