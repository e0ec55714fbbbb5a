//! hoodproxy command line tool
//!
//! Builds the configuration, runs the proxy, and stops it on Ctrl+C or SIGTERM.

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use hoodproxy::{ProxyServer, Result, VERSION, APP_NAME};
use hoodproxy::common::init_logger;
use hoodproxy::config::{log_config, ConfigOverrides, ProxyConfig};

/// hoodproxy: minimal TCP forwarding proxy
///
/// Every option can also be set in a JSON config file or through a
/// HOODPROXY_<OPTION> environment variable (e.g. HOODPROXY_LISTEN_PORT).
/// Command line values take precedence.
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen IP address [default: 0.0.0.0]
    #[arg(long)]
    listen_ip: Option<String>,

    /// Listen port (required unless set in the config file or environment)
    #[arg(long)]
    listen_port: Option<u16>,

    /// Destination IP address (required unless set in the config file or environment)
    #[arg(long)]
    dest_ip: Option<String>,

    /// Destination port (required unless set in the config file or environment)
    #[arg(long)]
    dest_port: Option<u16>,

    /// Load configuration from a JSON file
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum bytes read per forwarded chunk
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    backlog: Option<u32>,

    /// Delay before retrying after an accept or connect error, in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Destination connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Seconds to wait for open connections on shutdown before aborting them
    #[arg(long)]
    shutdown_timeout: Option<u64>,

    /// Log every forwarded chunk (raw bytes and decoded text)
    #[arg(long)]
    dump_traffic: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen_ip: self.listen_ip.clone(),
            listen_port: self.listen_port,
            dest_ip: self.dest_ip.clone(),
            dest_port: self.dest_port,
            backlog: self.backlog,
            buffer_size: self.buffer_size,
            retry_delay_ms: self.retry_delay_ms,
            connect_timeout: self.connect_timeout,
            shutdown_timeout: self.shutdown_timeout,
            dump_traffic: self.dump_traffic.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // The logger depends on a valid configuration, so report errors here directly
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    init_logger(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the configuration (defaults < file < environment < command line) and validate it
fn load_config(args: &Args) -> Result<ProxyConfig> {
    let config = ProxyConfig::load(args.config_file.as_deref())?.merge_overrides(args.overrides());
    config.validate()?;
    Ok(config)
}

async fn run(config: ProxyConfig) -> Result<()> {
    info!("Starting {} v{}", APP_NAME, VERSION);

    for warning in config.check() {
        warn!("{}", warning);
    }
    log_config(&config);

    let proxy = ProxyServer::from_config(Arc::new(config))?;
    proxy.run()?;

    info!("Proxy service ready, press Ctrl+C to stop");

    wait_for_shutdown_signal().await;

    proxy.stop().await?;
    info!("Exiting...");
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on Unix
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Unable to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl+C: {}", e);
    }
}
