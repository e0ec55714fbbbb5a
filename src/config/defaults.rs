//! Default configuration values
//!
//! This module is the single source of truth for configuration defaults.

/// Environment variable prefix for all configuration options (`HOODPROXY_LISTEN_PORT`, ...)
pub const ENV_PREFIX: &str = "HOODPROXY";

/// Default listen IP address
pub const LISTEN_IP_STR: &str = "0.0.0.0";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Accepted log levels
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Default listen IP address
pub fn listen_ip() -> String {
    LISTEN_IP_STR.to_string()
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default read chunk size for forwarding (1KB)
pub fn buffer_size() -> usize {
    1024
}

/// Default listen backlog
pub fn backlog() -> u32 {
    100
}

/// Default delay before the accept loop retries after an error, in milliseconds
pub fn retry_delay_ms() -> u64 {
    500
}

/// Default destination connect timeout in seconds
pub fn connect_timeout() -> u64 {
    10
}

/// Default time `stop()` waits for forwarders before aborting them, in seconds
pub fn shutdown_timeout() -> u64 {
    5
}

/// Per-chunk traffic dumps are off unless asked for
pub fn dump_traffic() -> bool {
    false
}
