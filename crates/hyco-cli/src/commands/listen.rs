//! `hyco listen`: serve the hybrid connection until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use hyco_client::{EchoHandler, RelayListener, SessionConfig};
use hyco_core::RelayEndpoint;

pub async fn run(endpoint: RelayEndpoint, session: SessionConfig) -> Result<()> {
    let listener = RelayListener::new(endpoint, Arc::new(EchoHandler)).with_config(session);
    println!(
        "Listening on {}/{} (id {})",
        listener.endpoint().namespace,
        listener.endpoint().path,
        listener.correlation_id()
    );
    println!("Press Ctrl+C to stop.");

    let shutdown = CancellationToken::new();
    let interrupt = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        })
    };

    let result = listener.run(shutdown).await;
    interrupt.abort();
    result.context("listener stopped")
}
