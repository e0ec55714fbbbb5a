//! Proxy server module
//!
//! This module implements the proxy server: it owns the listening socket,
//! runs the acceptance loop, and tracks the forwarding tasks of every live
//! connection pair so that `stop()` can shut them down.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::common::{AddressSpec, ProxyError, Result};
use crate::config::ProxyConfig;
use super::handler::handle_connection;

/// Lifecycle phase of a [`ProxyServer`]
///
/// Phases only move forward: `Created -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Constructed, `run()` not called yet
    Created,
    /// Accepting connections
    Running,
    /// Stopped for good; the instance cannot be restarted
    Stopped,
}

enum ServerState {
    Created,
    Running {
        local_addr: SocketAddr,
        acceptor: JoinHandle<()>,
    },
    Stopped,
}

/// Proxy server structure
///
/// Accepts client connections on the listen address and forwards each one
/// to the destination.
pub struct ProxyServer {
    /// Listen address for the proxy server
    listen: AddressSpec,
    /// Destination every client is forwarded to
    destination: AddressSpec,
    /// Proxy configuration (wrapped in Arc for efficient sharing)
    config: Arc<ProxyConfig>,
    state: Mutex<ServerState>,
    /// Stop signal shared by the acceptance task and all forwarders
    stop_tx: watch::Sender<bool>,
    /// Forwarding tasks of live connection pairs
    forwarders: Arc<Mutex<JoinSet<()>>>,
}

/// Everything the acceptance task owns
struct AcceptLoop {
    listener: TcpListener,
    local_addr: SocketAddr,
    destination: AddressSpec,
    config: Arc<ProxyConfig>,
    stop: watch::Receiver<bool>,
    forwarders: Arc<Mutex<JoinSet<()>>>,
}

impl ProxyServer {
    /// Create a new proxy instance
    ///
    /// # Parameters
    ///
    /// * `listen` - Listen address
    /// * `destination` - Destination address
    /// * `config` - Proxy configuration (buffer size, backlog, timeouts)
    ///
    /// # Example
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use hoodproxy::{AddressSpec, ProxyServer};
    /// # use hoodproxy::config::ProxyConfig;
    /// let proxy = ProxyServer::new(
    ///     AddressSpec::new("127.0.0.1", 18080).unwrap(),
    ///     AddressSpec::new("127.0.0.1", 9000).unwrap(),
    ///     Arc::new(ProxyConfig::default()),
    /// );
    /// assert!(!proxy.is_running());
    /// ```
    pub fn new(listen: AddressSpec, destination: AddressSpec, config: Arc<ProxyConfig>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            listen,
            destination,
            config,
            state: Mutex::new(ServerState::Created),
            stop_tx,
            forwarders: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Create a proxy from the listen and destination addresses in `config`
    pub fn from_config(config: Arc<ProxyConfig>) -> Result<Self> {
        let listen = config.listen_address()?;
        let destination = config.destination()?;
        Ok(Self::new(listen, destination, config))
    }

    /// Start the proxy service
    ///
    /// Binds the listen address and spawns the acceptance task, then returns
    /// without waiting for any connection. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// * `ProxyError::AlreadyRunning` if the proxy is already running
    /// * `ProxyError::AlreadyStopped` if the proxy was stopped
    /// * `ProxyError::Bind` if the listen address cannot be bound; the proxy
    ///   stays in the `Created` phase
    pub fn run(&self) -> Result<()> {
        let mut state = lock(&self.state);
        match *state {
            ServerState::Created => {}
            ServerState::Running { .. } => return Err(ProxyError::AlreadyRunning),
            ServerState::Stopped => return Err(ProxyError::AlreadyStopped),
        }

        info!("Starting proxy ({} -> {})", self.listen, self.destination);

        let listener = self.listen.listen(self.config.backlog)?;
        let local_addr = listener.local_addr()?;

        info!("Proxy service started, listening on {}", local_addr);

        let accept_loop = AcceptLoop {
            listener,
            local_addr,
            destination: self.destination.clone(),
            config: Arc::clone(&self.config),
            stop: self.stop_tx.subscribe(),
            forwarders: Arc::clone(&self.forwarders),
        };
        let acceptor = tokio::spawn(accept_loop.run());

        *state = ServerState::Running { local_addr, acceptor };
        Ok(())
    }

    /// Stop the proxy service
    ///
    /// Fires the stop signal, waits for the acceptance task to release the
    /// listener, then joins every forwarding task. Forwarders still alive
    /// after the configured shutdown timeout are aborted, closing their
    /// sockets. Stopping a proxy that was never run just marks it stopped.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::AlreadyStopped` if the proxy was already stopped.
    pub async fn stop(&self) -> Result<()> {
        let previous = {
            let mut state = lock(&self.state);
            if matches!(*state, ServerState::Stopped) {
                return Err(ProxyError::AlreadyStopped);
            }
            std::mem::replace(&mut *state, ServerState::Stopped)
        };

        info!("Stopping TCP proxy ({} -> {})", self.listen, self.destination);
        self.stop_tx.send_replace(true);

        if let ServerState::Running { acceptor, .. } = previous {
            if let Err(e) = acceptor.await {
                error!("Acceptance task error: {}", e);
            }
        }

        let mut forwarders = std::mem::take(&mut *lock(&self.forwarders));
        drain_forwarders(&mut forwarders, self.config.shutdown_timeout_duration()).await;

        info!("Proxy service shutdown complete");
        Ok(())
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ServerPhase {
        match *lock(&self.state) {
            ServerState::Created => ServerPhase::Created,
            ServerState::Running { .. } => ServerPhase::Running,
            ServerState::Stopped => ServerPhase::Stopped,
        }
    }

    /// Whether the proxy is accepting connections
    pub fn is_running(&self) -> bool {
        self.phase() == ServerPhase::Running
    }

    /// Whether the proxy has been stopped
    pub fn is_stopped(&self) -> bool {
        self.phase() == ServerPhase::Stopped
    }

    /// Address the listener is actually bound to, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *lock(&self.state) {
            ServerState::Running { local_addr, .. } => Some(local_addr),
            _ => None,
        }
    }

    /// Number of forwarding tasks still alive (two per live connection pair)
    pub fn active_forwarders(&self) -> usize {
        let mut forwarders = lock(&self.forwarders);
        reap_finished(&mut forwarders);
        forwarders.len()
    }

    /// Configured listen address
    pub fn listen_address(&self) -> &AddressSpec {
        &self.listen
    }

    /// Configured destination address
    pub fn destination(&self) -> &AddressSpec {
        &self.destination
    }
}

impl AcceptLoop {
    /// Accept clients until the stop signal fires
    ///
    /// Errors while accepting or connecting are logged and followed by a
    /// fixed retry delay; they never end the loop.
    async fn run(mut self) {
        loop {
            reap_finished(&mut lock(&self.forwarders));

            let accepted = tokio::select! {
                biased;
                _ = self.stop.wait_for(|stopped| *stopped) => break,
                accepted = self.listener.accept() => accepted,
            };

            let result = match accepted {
                Ok((client, client_addr)) => {
                    info!("Got new connection at {}. Proxying traffic...", client_addr);
                    let pair_stop = self.stop.clone();
                    tokio::select! {
                        biased;
                        _ = self.stop.wait_for(|stopped| *stopped) => break,
                        handled = handle_connection(
                            client,
                            client_addr,
                            &self.destination,
                            &self.config,
                            pair_stop,
                            &self.forwarders,
                        ) => handled,
                    }
                }
                Err(e) => Err(ProxyError::Io(e)),
            };

            if let Err(e) = result {
                error!("Error while attempting to proxy a new connection: {}", e);
                tokio::select! {
                    biased;
                    _ = self.stop.wait_for(|stopped| *stopped) => break,
                    _ = tokio::time::sleep(self.config.retry_delay()) => {}
                }
            }
        }

        info!("Acceptance loop stopped, closing listener on {}", self.local_addr);
    }
}

/// Join every forwarding task, aborting the stragglers after `grace`
async fn drain_forwarders(forwarders: &mut JoinSet<()>, grace: Duration) {
    if forwarders.is_empty() {
        return;
    }

    info!("Waiting for {} forwarding task(s) to finish...", forwarders.len());

    let joined = tokio::time::timeout(grace, async {
        while let Some(result) = forwarders.join_next().await {
            if let Err(e) = result {
                error!("Forwarding task error during shutdown: {}", e);
            }
        }
    })
    .await;

    if joined.is_err() {
        warn!(
            "Shutdown timeout reached, aborting {} forwarding task(s)",
            forwarders.len()
        );
        forwarders.shutdown().await;
    }
}

/// Collect forwarding tasks that already finished
fn reap_finished(forwarders: &mut JoinSet<()>) {
    while let Some(result) = forwarders.try_join_next() {
        match result {
            Ok(()) => debug!("Forwarding task finished"),
            Err(e) => error!("Task error: {}", e),
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
