//! Configuration structures and methods
//!
//! This module defines the proxy configuration structure, its validation,
//! and the command-line override layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::{AddressSpec, ProxyError, Result};
use crate::config::defaults;

/// Proxy configuration
///
/// Contains all configuration options needed for the proxy server.
/// A port of 0 or an empty `dest_ip` means "not set"; `validate()` rejects
/// configurations where a required value is still unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct ProxyConfig {
    // --- Network settings ---

    /// IP address (or host name) to listen on
    #[serde(default = "defaults::listen_ip")]
    pub listen_ip: String,

    /// Port to listen on (required)
    pub listen_port: u16,

    /// Destination IP address (or host name) (required)
    pub dest_ip: String,

    /// Destination port (required)
    pub dest_port: u16,

    /// Listen backlog
    #[serde(default = "defaults::backlog")]
    pub backlog: u32,

    // --- Forwarding settings ---

    /// Maximum number of bytes read per forwarding chunk
    #[serde(default = "defaults::buffer_size")]
    pub buffer_size: usize,

    /// Delay before the accept loop retries after an error, in milliseconds
    #[serde(default = "defaults::retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Destination connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout: u64,

    /// How long `stop()` waits for forwarders before aborting them, in seconds
    #[serde(default = "defaults::shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Log every forwarded chunk (raw and decoded)
    #[serde(default = "defaults::dump_traffic")]
    pub dump_traffic: bool,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for ProxyConfig {
    /// Create a default configuration using centralized defaults
    fn default() -> Self {
        Self {
            listen_ip: defaults::listen_ip(),
            listen_port: 0,
            dest_ip: String::new(),
            dest_port: 0,
            backlog: defaults::backlog(),
            buffer_size: defaults::buffer_size(),
            retry_delay_ms: defaults::retry_delay_ms(),
            connect_timeout: defaults::connect_timeout(),
            shutdown_timeout: defaults::shutdown_timeout(),
            dump_traffic: defaults::dump_traffic(),
            log_level: defaults::log_level(),
        }
    }
}

/// Values supplied on the command line
///
/// `None` leaves the underlying configuration value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub listen_ip: Option<String>,
    pub listen_port: Option<u16>,
    pub dest_ip: Option<String>,
    pub dest_port: Option<u16>,
    pub backlog: Option<u32>,
    pub buffer_size: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub shutdown_timeout: Option<u64>,
    pub dump_traffic: Option<bool>,
    pub log_level: Option<String>,
}

impl ProxyConfig {
    /// Create a configuration for the given listen and destination endpoints
    ///
    /// All other values are defaults.
    pub fn new(listen: &AddressSpec, destination: &AddressSpec) -> Self {
        Self {
            listen_ip: listen.host().to_string(),
            listen_port: listen.port(),
            dest_ip: destination.host().to_string(),
            dest_port: destination.port(),
            ..Self::default()
        }
    }

    /// Apply command-line overrides on top of this configuration
    ///
    /// Command-line values have the highest priority.
    pub fn merge_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.listen_ip { self.listen_ip = v; }
        if let Some(v) = overrides.listen_port { self.listen_port = v; }
        if let Some(v) = overrides.dest_ip { self.dest_ip = v; }
        if let Some(v) = overrides.dest_port { self.dest_port = v; }
        if let Some(v) = overrides.backlog { self.backlog = v; }
        if let Some(v) = overrides.buffer_size { self.buffer_size = v; }
        if let Some(v) = overrides.retry_delay_ms { self.retry_delay_ms = v; }
        if let Some(v) = overrides.connect_timeout { self.connect_timeout = v; }
        if let Some(v) = overrides.shutdown_timeout { self.shutdown_timeout = v; }
        if let Some(v) = overrides.dump_traffic { self.dump_traffic = v; }
        if let Some(v) = overrides.log_level { self.log_level = v; }
        self
    }

    /// Address the proxy listens on
    pub fn listen_address(&self) -> Result<AddressSpec> {
        AddressSpec::new(self.listen_ip.clone(), self.listen_port)
    }

    /// Address every accepted client is forwarded to
    pub fn destination(&self) -> Result<AddressSpec> {
        AddressSpec::new(self.dest_ip.clone(), self.dest_port)
    }

    /// Accept-loop retry delay
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Destination connect timeout
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Upper bound on how long `stop()` drains forwarders
    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Validate configuration
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` if configuration is valid, otherwise returns an error.
    pub fn validate(&self) -> Result<()> {
        if self.listen_ip.trim().is_empty() {
            return Err(ProxyError::Config("listen_ip must not be empty".to_string()));
        }
        if self.listen_port == 0 {
            return Err(ProxyError::Config(
                "listen_port is required (--listen-port)".to_string(),
            ));
        }
        if self.dest_ip.trim().is_empty() {
            return Err(ProxyError::Config("dest_ip is required (--dest-ip)".to_string()));
        }
        if self.dest_port == 0 {
            return Err(ProxyError::Config("dest_port is required (--dest-port)".to_string()));
        }

        if self.buffer_size == 0 {
            return Err(ProxyError::Config("buffer_size must be greater than 0".to_string()));
        }
        if self.backlog == 0 {
            return Err(ProxyError::Config("backlog must be greater than 0".to_string()));
        }
        if self.connect_timeout == 0 {
            return Err(ProxyError::Config("connect_timeout must be greater than 0".to_string()));
        }

        let level = self.log_level.to_lowercase();
        if !defaults::LOG_LEVELS.contains(&level.as_str()) {
            return Err(ProxyError::Config(format!(
                "Invalid log level: {}. Valid values are: {}",
                self.log_level,
                defaults::LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Check configuration for potential issues
    ///
    /// Unlike `validate()`, this never fails; it returns a list of warnings.
    pub fn check(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.listen_port == self.dest_port && self.listen_ip == self.dest_ip {
            warnings.push(format!(
                "Destination {}:{} is the listen address; the proxy would forward to itself",
                self.dest_ip, self.dest_port
            ));
        }

        if self.dump_traffic {
            warnings.push("Traffic dumping is enabled; every forwarded chunk will be logged".to_string());
        }

        if self.shutdown_timeout == 0 {
            warnings.push("shutdown_timeout is 0; open connections are aborted immediately on stop".to_string());
        }

        warnings
    }
}
