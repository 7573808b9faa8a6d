//! hyco-client: relay listener runtime for Hybrid Connections.
//!
//! Registers as a listener on a relay over WebSocket, keeps the connection
//! alive with pings, renews its SAS token in-band, answers forwarded HTTP
//! requests through a [`RequestHandler`], and opens a data session for every
//! accepted client WebSocket.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hyco_client::{EchoHandler, RelayListener};
//! use hyco_core::RelayEndpoint;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> hyco_core::HycoResult<()> {
//! let endpoint = RelayEndpoint::new(
//!     "contoso.servicebus.windows.net",
//!     "orders",
//!     "RootManageSharedAccessKey",
//!     "<key>",
//! );
//! let listener = RelayListener::new(endpoint, Arc::new(EchoHandler));
//! listener.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod listener;
pub mod registry;
pub mod sender;
pub mod session;
pub mod transport;

// Re-export primary public types.
pub use handler::{EchoHandler, RelayedRequest, RequestHandler, NO_BODY};
pub use listener::RelayListener;
pub use registry::{SessionEntry, SessionRegistry};
pub use sender::{HttpSender, WsSender};
pub use session::{Role, Session, SessionConfig, SessionContext, SessionState};
pub use transport::{MemoryConnector, MemoryPeer, WebSocketConnector};

// Re-export hyco-core error types for convenience.
pub use hyco_core::{HycoError, HycoResult};
