//! hyco-core: Shared protocol library for Hybrid Connections relays.
//!
//! Provides relay endpoint addressing, SAS token creation, the JSON control
//! envelopes exchanged with the relay, their codec, and abstract transport
//! traits implemented by the client crate.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod messages;
pub mod token;
pub mod transport;

// Re-export commonly used items at crate root.
pub use endpoint::{RelayEndpoint, AUTHORIZATION_HEADER};
pub use error::{HycoError, HycoResult};
pub use messages::{AcceptEnvelope, Envelope, RemoteEndpoint, RequestEnvelope, ResponseEnvelope};
pub use codec::{decode, encode};
pub use token::{HmacSha256Signer, SasToken, Signer, TokenFactory, TOKEN_TTL_SECS};
pub use transport::{BoxFuture, Connection, Connector, Frame, FrameKind, FrameSink, FrameSource};
