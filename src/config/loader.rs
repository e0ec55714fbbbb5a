//! Configuration loader implementation
//!
//! Layers the configuration sources with the `config` crate:
//! 1. Default values (lowest priority, via serde defaults)
//! 2. Configuration file (JSON)
//! 3. Environment variables (`HOODPROXY_*`)
//!
//! Command line overrides are applied afterwards by the binary.

use std::path::Path;
use log::debug;
use config::{Config, Environment, File, FileFormat};

use crate::common::{ProxyError, Result};
use crate::config::defaults;
use crate::config::ProxyConfig;

impl ProxyConfig {
    /// Load configuration from a single JSON file
    ///
    /// Values missing from the file keep their defaults. Environment
    /// variables are not consulted.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from file: {}", path.display());

        Config::builder()
            .add_source(File::new(file_name(path)?, FileFormat::Json).required(true))
            .build()?
            .try_deserialize::<Self>()
            .map_err(|e| ProxyError::Config(format!(
                "Failed to parse configuration file {}: {}", path.display(), e
            )))
    }

    /// Load configuration from defaults, an optional file, and the environment
    ///
    /// A file that is named explicitly must exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            debug!("Adding configuration file source: {}", path.display());
            builder = builder.add_source(File::new(file_name(path)?, FileFormat::Json).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?.try_deserialize::<Self>()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }
}

/// Check that a named configuration file exists and return its path as a string
fn file_name(path: &Path) -> Result<&str> {
    let name = path.to_str().ok_or_else(|| ProxyError::Config(format!(
        "Configuration file path is not valid UTF-8: {}", path.display()
    )))?;

    if !path.is_file() {
        return Err(ProxyError::Config(format!(
            "Configuration file not found: {}", path.display()
        )));
    }

    Ok(name)
}
