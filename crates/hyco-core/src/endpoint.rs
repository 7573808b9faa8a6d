//! Relay endpoint addressing.
//!
//! A `RelayEndpoint` names one hybrid connection (`namespace` + `path`) and
//! the shared access key used to sign tokens for it. All relay URIs are
//! derived from it:
//!
//! - listener: `wss://<ns>:443/$hc/<path>?sb-hc-action=listen&sb-hc-id=<id>`
//! - WebSocket sender: `wss://<ns>:443/$hc/<path>?sb-hc-action=connect`
//! - HTTP sender: `https://<ns>/<path>`

use std::fmt;

use url::form_urlencoded;

use crate::error::{HycoError, HycoResult};

/// Header carrying the SAS token on every authorized relay request.
pub const AUTHORIZATION_HEADER: &str = "ServiceBusAuthorization";

/// Port the relay accepts WebSocket connections on.
const RELAY_WSS_PORT: u16 = 443;

/// Immutable relay configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    /// Namespace host, e.g. `contoso.servicebus.windows.net`.
    pub namespace: String,
    /// Hybrid connection name.
    pub path: String,
    /// Name of the shared access policy (`skn`).
    pub key_rule: String,
    /// Shared access key. Used verbatim as the HMAC key.
    pub key: String,
    /// Whether senders must present a token.
    pub client_auth_required: bool,
}

impl RelayEndpoint {
    pub fn new(
        namespace: impl Into<String>,
        path: impl Into<String>,
        key_rule: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
            key_rule: key_rule.into(),
            key: key.into(),
            client_auth_required: true,
        }
    }

    /// Check that every field needed to address and sign is present.
    pub fn validate(&self) -> HycoResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(HycoError::Config("relay namespace is empty".into()));
        }
        if self.namespace.contains('/') || self.namespace.contains(':') {
            return Err(HycoError::Config(format!(
                "relay namespace must be a bare host name, got '{}'",
                self.namespace
            )));
        }
        if self.trimmed_path().is_empty() {
            return Err(HycoError::Config("relay path is empty".into()));
        }
        if self.key_rule.is_empty() {
            return Err(HycoError::Config("key rule name is empty".into()));
        }
        if self.key.is_empty() {
            return Err(HycoError::Config("signing key is empty".into()));
        }
        Ok(())
    }

    fn trimmed_path(&self) -> &str {
        self.path.trim_matches('/')
    }

    /// Canonical resource URI that tokens are scoped to.
    ///
    /// Always `http`, never `wss`, and never carries a query string.
    pub fn resource_uri(&self) -> String {
        format!("http://{}/{}", self.namespace, self.trimmed_path())
    }

    /// URI the control session dials to register as a listener.
    pub fn listener_uri(&self, correlation_id: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("sb-hc-action", "listen");
        if !correlation_id.is_empty() {
            query.append_pair("sb-hc-id", correlation_id);
        }
        format!("{}?{}", self.hc_base(), query.finish())
    }

    /// URI a WebSocket sender dials to reach the listener.
    pub fn sender_ws_uri(&self, correlation_id: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("sb-hc-action", "connect");
        if !correlation_id.is_empty() {
            query.append_pair("sb-hc-id", correlation_id);
        }
        format!("{}?{}", self.hc_base(), query.finish())
    }

    /// URI a plain HTTP sender posts requests to.
    pub fn https_uri(&self, correlation_id: &str) -> String {
        let base = format!("https://{}/{}", self.namespace, self.trimmed_path());
        if correlation_id.is_empty() {
            return base;
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("sb-hc-id", correlation_id)
            .finish();
        format!("{base}?{query}")
    }

    fn hc_base(&self) -> String {
        format!(
            "wss://{}:{}/$hc/{}",
            self.namespace,
            RELAY_WSS_PORT,
            self.trimmed_path()
        )
    }
}

// The signing key never reaches logs.
impl fmt::Debug for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayEndpoint")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .field("key_rule", &self.key_rule)
            .field("key", &"<redacted>")
            .field("client_auth_required", &self.client_auth_required)
            .finish()
    }
}
