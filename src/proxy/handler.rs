//! Connection handler module
//!
//! This module turns one accepted client into a connection pair and spawns
//! the two forwarding tasks for it.

use log::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::common::{AddressSpec, ProxyError, Result};
use crate::config::ProxyConfig;
use super::forwarder::{forward, ForwardOptions};
use super::server::lock;

/// Handle a single client connection
///
/// Opens the destination connection, then registers one forwarding task per
/// direction in `forwarders`. Returns as soon as both tasks are spawned.
///
/// # Errors
///
/// Returns `ProxyError::Connect` if the destination refuses, is unreachable,
/// or does not answer within the configured connect timeout. The client
/// stream is dropped in that case.
pub async fn handle_connection(
    client: TcpStream,
    client_addr: SocketAddr,
    destination: &AddressSpec,
    config: &ProxyConfig,
    stop: watch::Receiver<bool>,
    forwarders: &Mutex<JoinSet<()>>,
) -> Result<()> {
    let server = timeout(config.connect_timeout_duration(), destination.connect())
        .await
        .map_err(|_| ProxyError::Connect {
            addr: destination.to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "Connection timed out"),
        })??;

    info!("Connected {} to destination {}", client_addr, destination);

    let client_label = client_addr.to_string();
    let server_label = destination.to_string();
    let options = ForwardOptions::from(config);

    let (client_read, client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let mut tasks = lock(forwarders);
    tasks.spawn(run_direction(
        client_label.clone(),
        client_read,
        server_label.clone(),
        server_write,
        stop.clone(),
        options,
    ));
    tasks.spawn(run_direction(
        server_label,
        server_read,
        client_label,
        client_write,
        stop,
        options,
    ));

    Ok(())
}

/// One forwarding task; errors end this direction only
async fn run_direction<R, W>(
    source_label: String,
    source: R,
    dest_label: String,
    dest: W,
    stop: watch::Receiver<bool>,
    options: ForwardOptions,
) where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    match forward(&source_label, source, &dest_label, dest, stop, options).await {
        Ok(summary) => info!(
            "[{} -> {}] Forwarding finished after {} bytes ({:?})",
            source_label, dest_label, summary.bytes, summary.end
        ),
        Err(e) => warn!("[{} -> {}] Forwarding failed: {}", source_label, dest_label, e),
    }
}
