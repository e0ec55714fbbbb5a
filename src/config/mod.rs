//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the configuration.

mod config;
mod loader;
pub mod defaults;

pub use self::config::{ConfigOverrides, ProxyConfig};
pub use self::defaults::ENV_PREFIX;

use log::info;

/// Log the effective configuration
pub fn log_config(config: &ProxyConfig) {
    // Only log in info level or below
    if !log::log_enabled!(log::Level::Info) {
        return;
    }

    info!("=== Final Configuration ===");

    info!("Network Settings:");
    info!("  Listen address: {}:{}", config.listen_ip, config.listen_port);
    info!("  Destination address: {}:{}", config.dest_ip, config.dest_port);
    info!("  Backlog: {}", config.backlog);

    info!("Forwarding Settings:");
    info!("  Buffer size: {} bytes", config.buffer_size);
    info!("  Retry delay: {} ms", config.retry_delay_ms);
    info!("  Connect timeout: {} seconds", config.connect_timeout);
    info!("  Shutdown timeout: {} seconds", config.shutdown_timeout);
    info!("  Traffic dump: {}", if config.dump_traffic { "enabled" } else { "disabled" });

    info!("General Settings:");
    info!("  Log level: {}", config.log_level);

    info!("=========================");
}
