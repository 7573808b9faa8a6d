//! Control envelopes exchanged with the relay.
//!
//! Every control frame is a JSON object with exactly one top-level key naming
//! the envelope kind:
//!
//! ```text
//! {"request":{"id":..,"address":..,"method":..,"requestTarget":..,"body":true}}
//! {"accept":{"id":..,"address":..,"connectHeaders":{..},"remoteEndpoint":{..}}}
//! {"response":{"requestId":..,"statusCode":"200","responseHeaders":{..},"body":true}}
//! {"renewToken":{"token":..}}
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Address of the remote client, as reported by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

/// An HTTP request forwarded over the control channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub request_target: String,
    #[serde(default)]
    pub remote_endpoint: Option<RemoteEndpoint>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    /// Whether a body frame follows this envelope.
    #[serde(default, rename = "body")]
    pub has_body: bool,
}

/// A client WebSocket waiting to be accepted on a rendezvous address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptEnvelope {
    #[serde(default)]
    pub id: String,
    /// Rendezvous URI, already carrying a relay-issued accept token.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub connect_headers: HashMap<String, String>,
    #[serde(default)]
    pub remote_endpoint: Option<RemoteEndpoint>,
}

/// Listener reply to a forwarded request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(with = "status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default, rename = "body")]
    pub has_body: bool,
}

impl ResponseEnvelope {
    /// The immediate `200` acknowledgement sent for every forwarded request.
    pub fn accepted(request_id: &str) -> Self {
        let mut response_headers = BTreeMap::new();
        response_headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        Self {
            request_id: request_id.to_string(),
            status_code: 200,
            response_headers,
            has_body: true,
        }
    }
}

/// In-band token renewal for a live listener connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewTokenEnvelope {
    pub token: String,
}

/// A control envelope. Serializes externally tagged: `{"<kind>":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Envelope {
    Request(RequestEnvelope),
    Accept(AcceptEnvelope),
    Response(ResponseEnvelope),
    RenewToken(RenewTokenEnvelope),
}

impl Envelope {
    /// Correlation id carried by the envelope.
    pub fn id(&self) -> &str {
        match self {
            Envelope::Request(r) => &r.id,
            Envelope::Accept(a) => &a.id,
            Envelope::Response(r) => &r.request_id,
            Envelope::RenewToken(_) => "",
        }
    }
}

/// The relay emits status codes as strings; accept numbers too.
mod status_code {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(code: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(code)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u16),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}
