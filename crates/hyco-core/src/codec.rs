//! JSON codec for control envelopes.
//!
//! Inbound frames are classified by which tag carries a non-empty id:
//! `accept.id` selects [`Envelope::Accept`], `request.id` selects
//! [`Envelope::Request`]. A `request` without an id cannot be correlated and
//! is rejected, as is anything else.

use serde::Deserialize;

use crate::error::{HycoError, HycoResult};
use crate::messages::{AcceptEnvelope, Envelope, RequestEnvelope};

/// Loose view of an inbound frame; both tags are optional on the wire.
#[derive(Debug, Default, Deserialize)]
struct InboundHeader {
    #[serde(default)]
    request: Option<RequestEnvelope>,
    #[serde(default)]
    accept: Option<AcceptEnvelope>,
}

/// Decode an inbound control frame into a `Request` or `Accept` envelope.
pub fn decode(raw: &[u8]) -> HycoResult<Envelope> {
    let header: InboundHeader = serde_json::from_slice(raw)?;

    if let Some(accept) = header.accept.filter(|a| !a.id.is_empty()) {
        return Ok(Envelope::Accept(accept));
    }

    match header.request {
        Some(request) if !request.id.is_empty() => Ok(Envelope::Request(request)),
        Some(_) => Err(HycoError::Decode(format!(
            "cannot find request id in incoming payload: {}",
            String::from_utf8_lossy(raw)
        ))),
        None => Err(HycoError::Decode(format!(
            "unrecognized envelope: {}",
            String::from_utf8_lossy(raw)
        ))),
    }
}

/// Decode a text frame.
pub fn decode_text(text: &str) -> HycoResult<Envelope> {
    decode(text.as_bytes())
}

/// Serialize an envelope for a text frame.
pub fn encode(envelope: &Envelope) -> HycoResult<String> {
    Ok(serde_json::to_string(envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RenewTokenEnvelope, ResponseEnvelope};

    #[test]
    fn decodes_request() {
        let env = decode_text(
            r#"{"request":{"id":"r1","requestTarget":"/foo","method":"POST","body":false}}"#,
        )
        .unwrap();
        match env {
            Envelope::Request(r) => {
                assert_eq!(r.id, "r1");
                assert_eq!(r.method, "POST");
                assert_eq!(r.request_target, "/foo");
                assert!(!r.has_body);
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn decodes_accept() {
        let env = decode_text(
            r#"{"accept":{"id":"a1","address":"wss://x/y","connectHeaders":{"Sec-WebSocket-Version":"13"},
                "remoteEndpoint":{"address":"73.83.210.109","port":62917}}}"#,
        )
        .unwrap();
        match env {
            Envelope::Accept(a) => {
                assert_eq!(a.id, "a1");
                assert_eq!(a.address, "wss://x/y");
                assert_eq!(a.connect_headers["Sec-WebSocket-Version"], "13");
                assert_eq!(a.remote_endpoint.unwrap().address, "73.83.210.109");
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn accept_with_empty_id_falls_through_to_request() {
        let env = decode_text(r#"{"accept":{"id":""},"request":{"id":"r2"}}"#).unwrap();
        assert_eq!(env.id(), "r2");
        assert!(matches!(env, Envelope::Request(_)));
    }

    #[test]
    fn accept_wins_when_both_tags_carry_ids() {
        let env = decode_text(r#"{"accept":{"id":"a9"},"request":{"id":"r9"}}"#).unwrap();
        assert!(matches!(env, Envelope::Accept(_)));
    }

    #[test]
    fn request_without_id_is_rejected() {
        let err = decode_text(r#"{"request":{"method":"GET"}}"#).unwrap_err();
        assert!(matches!(err, HycoError::Decode(ref m) if m.contains("request id")));
    }

    #[test]
    fn unknown_and_malformed_are_rejected() {
        assert!(matches!(decode_text(r#"{"hello":{}}"#), Err(HycoError::Decode(_))));
        assert!(matches!(decode_text("not json"), Err(HycoError::Decode(_))));
        assert!(matches!(decode_text(r#"{"request":"r1"}"#), Err(HycoError::Decode(_))));
    }

    #[test]
    fn encodes_outbound_envelopes() {
        let text = encode(&Envelope::RenewToken(RenewTokenEnvelope { token: "t".into() })).unwrap();
        assert_eq!(text, r#"{"renewToken":{"token":"t"}}"#);

        let text = encode(&Envelope::Response(ResponseEnvelope::accepted("r1"))).unwrap();
        assert!(text.starts_with(r#"{"response":{"requestId":"r1","statusCode":"200""#));
        assert!(text.ends_with(r#""body":true}}"#));
    }
}
