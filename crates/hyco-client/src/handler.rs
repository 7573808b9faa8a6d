//! Application callback for relayed HTTP requests.
//!
//! The session acknowledges every forwarded request with a `200` response
//! envelope on its own, then hands the request to a [`RequestHandler`] and
//! sends whatever it returns as a binary frame. The relay does not tie that
//! frame to a request id, so handlers that care about correlation embed the
//! id in their payload (as [`EchoHandler`] does).

use std::collections::HashMap;

use hyco_core::messages::{RemoteEndpoint, RequestEnvelope};

/// Body marker used when a request declares no body.
pub const NO_BODY: &[u8] = b"noBody";

/// A request forwarded by the relay over the control channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedRequest {
    /// Relay correlation id.
    pub id: String,
    pub method: String,
    /// Request target (path and query) as seen by the relay.
    pub target: String,
    pub headers: HashMap<String, String>,
    pub remote: Option<RemoteEndpoint>,
    /// Raw body, or [`NO_BODY`] when none was declared.
    pub body: Vec<u8>,
}

impl RelayedRequest {
    pub fn from_envelope(envelope: RequestEnvelope, body: Vec<u8>) -> Self {
        Self {
            id: envelope.id,
            method: envelope.method,
            target: envelope.request_target,
            headers: envelope.request_headers,
            remote: envelope.remote_endpoint,
            body,
        }
    }

    /// Body as text, lossily decoded.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Produces the payload sent back for a relayed request.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &RelayedRequest) -> String;
}

impl<F> RequestHandler for F
where
    F: Fn(&RelayedRequest) -> String + Send + Sync,
{
    fn handle(&self, request: &RelayedRequest) -> String {
        self(request)
    }
}

/// Echoes a one-line description of every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn handle(&self, request: &RelayedRequest) -> String {
        let description = format!(
            "Received: {} on {} with ID {} and body {}",
            request.method,
            request.target,
            request.id,
            request.body_text()
        );
        serde_json::json!({ "echo": description }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &[u8]) -> RelayedRequest {
        RelayedRequest::from_envelope(
            RequestEnvelope {
                id: "r1".into(),
                method: "POST".into(),
                request_target: "/foo".into(),
                ..Default::default()
            },
            body.to_vec(),
        )
    }

    #[test]
    fn echo_describes_request() {
        let payload = EchoHandler.handle(&request(NO_BODY));
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            value["echo"],
            "Received: POST on /foo with ID r1 and body noBody"
        );
    }

    #[test]
    fn echo_escapes_body() {
        let payload = EchoHandler.handle(&request(br#"{"q":"x"}"#));
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(value["echo"].as_str().unwrap().ends_with(r#"body {"q":"x"}"#));
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |r: &RelayedRequest| format!("{}:{}", r.method, r.id);
        assert_eq!(handler.handle(&request(b"")), "POST:r1");
    }
}
