//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hoodproxy::config::ProxyConfig;
use hoodproxy::{AddressSpec, ProxyServer};

/// Reserve a currently unused local port
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn init_logging() {
    let _ = hoodproxy::common::try_init_logger("debug");
}

/// Echo server that also reports every chunk it receives
pub async fn spawn_echo_server(port: u16) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buffer = [0u8; 4096];
                loop {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let _ = tx.send(buffer[..n].to_vec());
                            if socket.write_all(&buffer[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    (handle, rx)
}

/// Configuration pointing a loopback listener at a loopback destination
pub fn test_config(listen_port: u16, dest_port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::new(
        &AddressSpec::new("127.0.0.1", listen_port).unwrap(),
        &AddressSpec::new("127.0.0.1", dest_port).unwrap(),
    );
    config.connect_timeout = 2;
    config.shutdown_timeout = 2;
    config
}

/// Start a proxy on a fresh port in front of `dest_port`
pub fn start_proxy(dest_port: u16) -> ProxyServer {
    start_proxy_with(test_config(free_port(), dest_port))
}

pub fn start_proxy_with(config: ProxyConfig) -> ProxyServer {
    let proxy = ProxyServer::from_config(Arc::new(config)).unwrap();
    proxy.run().unwrap();
    proxy
}
