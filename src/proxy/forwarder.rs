//! Data forwarding module
//!
//! This module relays bytes in one direction, from a source stream to a
//! destination stream, until the source closes or the stop signal fires.

use bytes::BytesMut;
use log::{debug, info};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::common::Result;
use crate::config::ProxyConfig;

/// Log target used for per-chunk traffic dumps
pub const TRAFFIC_LOG_TARGET: &str = "hoodproxy::traffic";

/// Per-direction forwarding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOptions {
    /// Maximum number of bytes read per chunk
    pub buffer_size: usize,
    /// Log every chunk (raw and decoded)
    pub dump_traffic: bool,
}

impl From<&ProxyConfig> for ForwardOptions {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            dump_traffic: config.dump_traffic,
        }
    }
}

/// Why a forwarding direction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardEnd {
    /// The source reached end of stream and the destination's write side was shut down
    SourceClosed,
    /// The stop signal fired (or its sender went away)
    Stopped,
}

/// Result of a finished forwarding direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Total bytes written to the destination
    pub bytes: u64,
    /// Why forwarding ended
    pub end: ForwardEnd,
}

/// Forward data from `source` to `dest`
///
/// Reads at most `options.buffer_size` bytes at a time and writes each chunk
/// in full. Both the read and the write race against `stop`, so a blocked
/// peer never keeps this task alive after the proxy is stopped.
///
/// A zero-byte read means the source half-closed; the half-close is
/// propagated by shutting down the destination's write side.
///
/// # Errors
///
/// Any read or write error ends this direction only and is returned to the caller.
pub async fn forward<R, W>(
    source_label: &str,
    mut source: R,
    dest_label: &str,
    mut dest: W,
    mut stop: watch::Receiver<bool>,
    options: ForwardOptions,
) -> Result<ForwardSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("[{} -> {}] Ready to forward packets...", source_label, dest_label);

    let mut buffer = BytesMut::with_capacity(options.buffer_size);
    let mut total_bytes: u64 = 0;

    let end = loop {
        buffer.clear();

        let read = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break ForwardEnd::Stopped,
            read = source.read_buf(&mut buffer) => read,
        };

        if read? == 0 {
            debug!("[{} -> {}] Source closed, shutting down write side", source_label, dest_label);
            match dest.shutdown().await {
                Ok(()) => {}
                // The destination already went away; nothing left to propagate
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
            break ForwardEnd::SourceClosed;
        }

        if options.dump_traffic {
            info!(target: TRAFFIC_LOG_TARGET, "{}", format_chunk(source_label, dest_label, &buffer));
        }

        tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break ForwardEnd::Stopped,
            written = dest.write_all(&buffer) => written?,
        }

        total_bytes += buffer.len() as u64;
    };

    debug!(
        "[{} -> {}] Transferred {} bytes total ({:?})",
        source_label, dest_label, total_bytes, end
    );

    Ok(ForwardSummary { bytes: total_bytes, end })
}

/// Render one chunk as escaped bytes and as lossily decoded text
fn format_chunk(source_label: &str, dest_label: &str, chunk: &BytesMut) -> String {
    format!(
        "[{} -> {}]\nBytes:\n{:?}\nDecoded:\n{}",
        source_label,
        dest_label,
        chunk,
        String::from_utf8_lossy(chunk)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::time::timeout;

    fn options(buffer_size: usize) -> ForwardOptions {
        ForwardOptions { buffer_size, dump_traffic: true }
    }

    #[tokio::test]
    async fn test_forwards_until_source_closes() {
        let (mut client, source) = duplex(64);
        let (dest, mut server) = duplex(64);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            forward("client", source, "server", dest, stop_rx, options(4)).await
        });

        client.write_all(b"hello, world").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello, world");

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.bytes, 12);
        assert_eq!(summary.end, ForwardEnd::SourceClosed);
    }

    #[tokio::test]
    async fn test_stop_interrupts_blocked_read() {
        let (_client, source) = duplex(64);
        let (dest, _server) = duplex(64);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            forward("client", source, "server", dest, stop_rx, options(1024)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send_replace(true);

        let summary = timeout(Duration::from_secs(2), task)
            .await
            .expect("forwarder should observe the stop signal")
            .unwrap()
            .unwrap();
        assert_eq!(summary.end, ForwardEnd::Stopped);
        assert_eq!(summary.bytes, 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_blocked_write() {
        let (mut client, source) = duplex(64);
        // One-byte pipe that nobody reads: write_all cannot complete
        let (dest, _server) = duplex(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        client.write_all(b"stuck payload").await.unwrap();

        let task = tokio::spawn(async move {
            forward("client", source, "server", dest, stop_rx, options(1024)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        stop_tx.send_replace(true);

        let summary = timeout(Duration::from_secs(2), task)
            .await
            .expect("forwarder should observe the stop signal while writing")
            .unwrap()
            .unwrap();
        assert_eq!(summary.end, ForwardEnd::Stopped);
        assert_eq!(summary.bytes, 0);
    }

    #[test]
    fn test_format_chunk() {
        let chunk = BytesMut::from(&b"fo\xffo\n"[..]);
        let dump = format_chunk("client", "server", &chunk);

        assert!(dump.starts_with("[client -> server]\n"));
        assert!(dump.contains(r#"b"fo\xffo\n""#));
        assert!(dump.contains("Decoded:\nfo\u{FFFD}o\n"));
    }

    #[tokio::test]
    async fn test_dropped_stop_sender_ends_forwarding() {
        let (_client, source) = duplex(64);
        let (dest, _server) = duplex(64);
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        let summary = timeout(
            Duration::from_secs(2),
            forward("client", source, "server", dest, stop_rx, options(1024)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(summary.end, ForwardEnd::Stopped);
    }

    #[tokio::test]
    async fn test_write_error_is_returned() {
        let (mut client, source) = duplex(64);
        let (dest, server) = duplex(64);
        drop(server);
        let (_stop_tx, stop_rx) = watch::channel(false);

        client.write_all(b"lost").await.unwrap();

        let result = forward("client", source, "server", dest, stop_rx, options(1024)).await;
        assert!(matches!(result, Err(crate::common::ProxyError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_forwarded_unchanged() {
        let (mut client, source) = duplex(64);
        let (dest, mut server) = duplex(64);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let payload = [0x66, 0x6f, 0xff, 0xfe, 0x6f];
        client.write_all(&payload).await.unwrap();
        drop(client);

        let summary = forward("client", source, "server", dest, stop_rx, options(2))
            .await
            .unwrap();
        assert_eq!(summary.bytes, payload.len() as u64);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);
    }
}
