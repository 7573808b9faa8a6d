//! Client side of a hybrid connection.
//!
//! [`HttpSender`] issues plain HTTPS requests that the relay forwards to the
//! listener as `request` envelopes. [`WsSender`] opens a WebSocket that the
//! relay hands to the listener through an `accept` envelope.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use hyco_core::endpoint::{RelayEndpoint, AUTHORIZATION_HEADER};
use hyco_core::error::{HycoError, HycoResult};
use hyco_core::token::TokenFactory;
use hyco_core::transport::{Connection, Connector};

use crate::transport::WebSocketConnector;

/// Content type sent with every relayed HTTP request.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends HTTP requests through the relay.
pub struct HttpSender {
    tokens: TokenFactory,
    client: reqwest::Client,
    uri: String,
}

impl HttpSender {
    pub fn new(endpoint: RelayEndpoint) -> HycoResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HycoError::Http(format!("cannot build HTTP client: {e}")))?;
        let uri = endpoint.https_uri("");
        Ok(Self {
            tokens: TokenFactory::new(endpoint),
            client,
            uri,
        })
    }

    /// Send to `uri` instead of the relay's HTTPS address.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Issue `method` with an optional JSON body and return the response
    /// body. Anything but `200 OK` is an error.
    pub async fn send(&self, method: &str, body: Option<&str>) -> HycoResult<Vec<u8>> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| HycoError::Http(format!("invalid method {method}: {e}")))?;

        let mut request = self
            .client
            .request(method.clone(), &self.uri)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if self.tokens.endpoint().client_auth_required {
            let token = self.tokens.create_token()?;
            request = request.header(AUTHORIZATION_HEADER, token.header_value());
        }
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            request = request.body(body.to_string());
        }

        debug!(method = %method, uri = %self.uri, "sending relayed request");
        let response = request
            .send()
            .await
            .map_err(|e| HycoError::Http(format!("{method} {} failed: {e}", self.uri)))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(method = %method, status = %status, "relay refused request");
            return Err(HycoError::Http(format!(
                "unable to connect: {method} {} returned {status}",
                self.uri
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HycoError::Http(format!("reading response body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Opens sender-side WebSocket connections through the relay.
pub struct WsSender {
    tokens: TokenFactory,
    connector: Arc<dyn Connector>,
}

impl WsSender {
    pub fn new(endpoint: RelayEndpoint) -> Self {
        Self {
            tokens: TokenFactory::new(endpoint),
            connector: Arc::new(WebSocketConnector::new()),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn uri(&self) -> String {
        self.tokens.endpoint().sender_ws_uri("")
    }

    /// Dial the connect URI. The relay turns this into an `accept` on the
    /// listener's control channel.
    pub async fn connect(&self) -> HycoResult<Connection> {
        let uri = self.uri();
        let mut headers = Vec::new();
        if self.tokens.endpoint().client_auth_required {
            let token = self.tokens.create_token()?;
            headers.push((AUTHORIZATION_HEADER.to_string(), token.header_value()));
        }
        debug!(uri = %uri, "opening sender WebSocket");
        self.connector.connect(&uri, &headers).await
    }
}
