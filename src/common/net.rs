//! Network utility functions
//!
//! This module provides [`AddressSpec`], the host/port endpoint type used for
//! both the listen side and the destination side of the proxy.

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use tokio::net::{TcpListener, TcpStream};

use super::error::{ProxyError, Result};

/// A TCP endpoint given as host and port
///
/// The host may be an IP literal or a name that resolves to one.
/// Deserialized values go through [`AddressSpec::new`] and are validated the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAddress")]
pub struct AddressSpec {
    host: String,
    port: u16,
}

/// Unvalidated host/port pair as read from a config source
#[derive(Deserialize)]
struct RawAddress {
    host: String,
    port: u16,
}

impl TryFrom<RawAddress> for AddressSpec {
    type Error = ProxyError;

    fn try_from(raw: RawAddress) -> Result<Self> {
        Self::new(raw.host, raw.port)
    }
}

impl AddressSpec {
    /// Create a new address
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the host is empty or the port is 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ProxyError::Config("Address host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(ProxyError::Config(format!(
                "Invalid port 0 for host {}: ports must be in 1..=65535", host
            )));
        }
        Ok(Self { host, port })
    }

    /// Host part
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve the address to socket addresses
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ProxyError::Network(format!("Failed to resolve {}: {}", self, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(ProxyError::Network(format!(
                "Address resolved but no socket addresses returned: {}", self
            )));
        }
        Ok(addrs)
    }

    /// Bind and listen on this address
    ///
    /// Every resolved address is tried in turn; the first one that binds wins.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Bind` if no resolved address could be bound.
    pub fn listen(&self, backlog: u32) -> Result<TcpListener> {
        let addrs = self.resolve().map_err(|e| ProxyError::Bind {
            addr: self.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        })?;

        let mut last_err = None;
        for addr in addrs {
            match bind_socket(addr, backlog) {
                Ok(listener) => return Ok(listener),
                Err(e) => {
                    log::debug!("Failed to bind {}: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(ProxyError::Bind {
            addr: self.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address to bind")
            }),
        })
    }

    /// Open a TCP connection to this address
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Connect` if the destination refuses or is unreachable.
    pub async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| ProxyError::Connect {
                addr: self.to_string(),
                source,
            })
    }
}

fn bind_socket(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for AddressSpec {
    type Err = ProxyError;

    /// Parse `host:port` or `[ipv6]:port`
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            ProxyError::Network(format!("Address '{}' is not in host:port form", s))
        })?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        let port = port
            .parse::<u16>()
            .map_err(|e| ProxyError::Network(format!("Invalid port in address '{}': {}", s, e)))?;

        Self::new(host, port)
    }
}
