//! Frame transports for relay sessions.
//!
//! - [`WebSocketConnector`] dials real relays (`wss://`) via tokio-tungstenite.
//! - [`MemoryConnector`] hands out in-process connections whose far end is a
//!   [`MemoryPeer`], used to script a relay in tests.

pub mod memory;
pub mod websocket;

pub use memory::{MemoryConnector, MemoryPeer};
pub use websocket::WebSocketConnector;

use hyco_core::error::{HycoError, HycoResult};

/// Check that a URI uses a WebSocket scheme before dialing it.
pub fn ensure_websocket_uri(uri: &str) -> HycoResult<()> {
    let lower = uri.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(HycoError::Transport(format!(
            "unsupported URL scheme: {uri} (expected ws:// or wss://)"
        )))
    }
}
