//! `hyco connect`: a WebSocket sender.
//!
//! Sends a timestamp line every interval and prints whatever comes back.
//! Ctrl-C closes the connection normally.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::time;
use tracing::{debug, info};

use hyco_client::WsSender;
use hyco_core::transport::{Connection, Frame};
use hyco_core::RelayEndpoint;

/// How long to wait for the reader after sending close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub async fn run(endpoint: RelayEndpoint, interval_secs: u64) -> Result<()> {
    let sender = WsSender::new(endpoint);
    info!(uri = %sender.uri(), "connecting");
    let Connection { mut sink, mut source } = sender
        .connect()
        .await
        .context("failed to open relayed WebSocket")?;

    let mut reader = tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(Frame::Text(text)) => println!("recv: {text}"),
                Ok(Frame::Binary(data)) => println!("recv: {}", String::from_utf8_lossy(&data)),
                Ok(Frame::Close) => break,
                Ok(other) => debug!(kind = ?other.kind(), "control frame"),
                Err(e) => {
                    debug!(error = %e, "read ended");
                    break;
                }
            }
        }
    });

    let mut ticker = time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut reader => {
                info!("connection closed by relay");
                return Ok(());
            }
            _ = ticker.tick() => {
                sink.send(Frame::Text(timestamp())).await.context("write failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt");
                sink.close().await.context("close failed")?;
                let _ = time::timeout(CLOSE_GRACE, &mut reader).await;
                return Ok(());
            }
        }
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}
