//! Hybrid Connection listener.
//!
//! [`RelayListener`] is the entry point most callers want: it owns the token
//! factory, the data session registry and the transport, registers on the
//! relay with a fresh correlation id and serves the control session until
//! shutdown. It does not reconnect; callers that want to stay registered
//! run it again after an error.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use hyco_core::endpoint::RelayEndpoint;
use hyco_core::error::HycoResult;
use hyco_core::token::{Signer, TokenFactory};
use hyco_core::transport::Connector;

use crate::handler::RequestHandler;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionConfig, SessionContext, SessionState};
use crate::transport::WebSocketConnector;

/// Listens on one hybrid connection.
pub struct RelayListener {
    tokens: Arc<TokenFactory>,
    context: SessionContext,
    correlation_id: String,
    state: watch::Sender<SessionState>,
}

impl RelayListener {
    /// Listener over WebSocket with the HMAC-SHA256 signer and default
    /// session cadence.
    pub fn new(endpoint: RelayEndpoint, handler: Arc<dyn RequestHandler>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            tokens: Arc::new(TokenFactory::new(endpoint)),
            context: SessionContext {
                connector: Arc::new(WebSocketConnector::new()),
                handler,
                registry: SessionRegistry::new(),
                config: SessionConfig::default(),
            },
            correlation_id: Uuid::new_v4().to_string(),
            state,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.context.connector = connector;
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        let endpoint = self.tokens.endpoint().clone();
        self.tokens = Arc::new(TokenFactory::with_signer(endpoint, signer));
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.context.config = config;
        self
    }

    pub fn endpoint(&self) -> &RelayEndpoint {
        self.tokens.endpoint()
    }

    /// Id sent as `sb-hc-id` when registering.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// URI the control session dials.
    pub fn listener_uri(&self) -> String {
        self.tokens.endpoint().listener_uri(&self.correlation_id)
    }

    /// Live data sessions. The handle stays valid after `run` returns.
    pub fn registry(&self) -> SessionRegistry {
        self.context.registry.clone()
    }

    /// Control session lifecycle.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Register with the relay and serve until `shutdown` fires or the
    /// control session ends.
    pub async fn run(self, shutdown: CancellationToken) -> HycoResult<()> {
        self.tokens.endpoint().validate()?;
        self.context.config.validate()?;

        let endpoint = self.tokens.endpoint();
        info!(
            namespace = %endpoint.namespace,
            path = %endpoint.path,
            id = %self.correlation_id,
            "connecting to relay"
        );

        let session = Session::connect_control(
            self.context.clone(),
            self.tokens.clone(),
            &self.correlation_id,
            self.state,
        )
        .await?;
        info!(namespace = %endpoint.namespace, path = %endpoint.path, "connected to relay");

        session.run(shutdown).await
    }
}
