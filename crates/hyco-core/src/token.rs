//! Shared access signature (SAS) tokens for relay authorization.
//!
//! String-to-sign: `urlencode(resource_uri) + "\n" + expiry`
//! Token: `SharedAccessSignature sr=<uri>&sig=<sig>&se=<expiry>&skn=<rule>`
//!
//! The signature is a base64 HMAC-SHA256 over the string-to-sign, keyed with
//! the raw bytes of the shared access key.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ring::hmac;
use url::form_urlencoded;

use crate::endpoint::RelayEndpoint;
use crate::error::{HycoError, HycoResult};

/// Validity window of every token, in seconds.
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Produces a signature for a string-to-sign.
pub trait Signer: Send + Sync {
    /// Sign `string_to_sign` with `key`, returning the base64 signature.
    fn sign(&self, key: &[u8], string_to_sign: &str) -> HycoResult<String>;
}

/// HMAC-SHA256 signer used against real relays.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256Signer;

impl Signer for HmacSha256Signer {
    fn sign(&self, key: &[u8], string_to_sign: &str) -> HycoResult<String> {
        if key.is_empty() {
            return Err(HycoError::Signer("empty signing key".into()));
        }
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        let tag = hmac::sign(&key, string_to_sign.as_bytes());
        Ok(B64.encode(tag.as_ref()))
    }
}

/// Query-escape a string the way the relay expects (`application/x-www-form-urlencoded`).
pub fn url_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// A signed, time-boxed authorization token.
#[derive(Clone, PartialEq, Eq)]
pub struct SasToken {
    /// URL-encoded resource URI (`sr`).
    pub resource: String,
    /// The exact bytes that were signed.
    pub string_to_sign: String,
    /// Base64 signature, not yet URL-encoded.
    pub signature: String,
    /// Expiry as unix seconds (`se`).
    pub expiry: u64,
    /// Key rule name (`skn`).
    pub key_rule: String,
}

impl SasToken {
    /// Value for the `ServiceBusAuthorization` header.
    pub fn header_value(&self) -> String {
        format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            self.resource,
            url_encode(&self.signature),
            self.expiry,
            self.key_rule
        )
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasToken")
            .field("resource", &self.resource)
            .field("expiry", &self.expiry)
            .field("key_rule", &self.key_rule)
            .finish_non_exhaustive()
    }
}

/// Builds fresh tokens for one relay endpoint.
pub struct TokenFactory {
    endpoint: RelayEndpoint,
    signer: Arc<dyn Signer>,
    ttl_secs: u64,
}

impl TokenFactory {
    /// Factory using the HMAC-SHA256 signer.
    pub fn new(endpoint: RelayEndpoint) -> Self {
        Self::with_signer(endpoint, Arc::new(HmacSha256Signer))
    }

    pub fn with_signer(endpoint: RelayEndpoint, signer: Arc<dyn Signer>) -> Self {
        Self {
            endpoint,
            signer,
            ttl_secs: TOKEN_TTL_SECS,
        }
    }

    pub fn endpoint(&self) -> &RelayEndpoint {
        &self.endpoint
    }

    /// Create a token valid for [`TOKEN_TTL_SECS`] from now.
    pub fn create_token(&self) -> HycoResult<SasToken> {
        self.create_token_at(unix_now())
    }

    /// Create a token as if the current time were `now` (unix seconds).
    pub fn create_token_at(&self, now: u64) -> HycoResult<SasToken> {
        let expiry = now + self.ttl_secs;
        let resource = url_encode(&self.endpoint.resource_uri());
        let string_to_sign = format!("{resource}\n{expiry}");
        let signature = self
            .signer
            .sign(self.endpoint.key.as_bytes(), &string_to_sign)?;

        Ok(SasToken {
            resource,
            string_to_sign,
            signature,
            expiry,
            key_rule: self.endpoint.key_rule.clone(),
        })
    }
}

impl fmt::Debug for TokenFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFactory")
            .field("endpoint", &self.endpoint)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign(&self, _key: &[u8], _string_to_sign: &str) -> HycoResult<String> {
            Ok("c2ln+/=".into())
        }
    }

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _key: &[u8], _string_to_sign: &str) -> HycoResult<String> {
            Err(HycoError::Signer("hsm unavailable".into()))
        }
    }

    fn endpoint() -> RelayEndpoint {
        RelayEndpoint::new("gorelay.servicebus.windows.net", "yesclientauth", "managepolicy", "secret")
    }

    #[test]
    fn deterministic_with_fixed_signer_and_clock() {
        let factory = TokenFactory::with_signer(endpoint(), Arc::new(FixedSigner));
        let a = factory.create_token_at(1_700_000_000).unwrap();
        let b = factory.create_token_at(1_700_000_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.expiry, 1_700_000_000 + 3600);
    }

    #[test]
    fn string_to_sign_and_header_format() {
        let factory = TokenFactory::with_signer(endpoint(), Arc::new(FixedSigner));
        let token = factory.create_token_at(1000).unwrap();

        assert_eq!(
            token.string_to_sign,
            "http%3A%2F%2Fgorelay.servicebus.windows.net%2Fyesclientauth\n4600"
        );
        assert_eq!(
            token.header_value(),
            "SharedAccessSignature sr=http%3A%2F%2Fgorelay.servicebus.windows.net%2Fyesclientauth\
             &sig=c2ln%2B%2F%3D&se=4600&skn=managepolicy"
        );
        assert_eq!(token.to_string(), token.header_value());
    }

    #[test]
    fn hmac_signature_matches_reference() {
        // RFC 4231 test case 2.
        let sig = HmacSha256Signer
            .sign(b"Jefe", "what do ya want for nothing?")
            .unwrap();
        assert_eq!(sig, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn signer_failure_propagates() {
        let factory = TokenFactory::with_signer(endpoint(), Arc::new(FailingSigner));
        let err = factory.create_token_at(0).unwrap_err();
        assert!(matches!(err, HycoError::Signer(_)));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(HmacSha256Signer.sign(b"", "x").is_err());
    }

    #[test]
    fn fresh_token_expires_an_hour_out() {
        let factory = TokenFactory::new(endpoint());
        let before = unix_now();
        let token = factory.create_token().unwrap();
        let after = unix_now();
        assert!(token.expiry >= before + TOKEN_TTL_SECS);
        assert!(token.expiry <= after + TOKEN_TTL_SECS);
    }

    #[test]
    fn debug_omits_signature() {
        let factory = TokenFactory::with_signer(endpoint(), Arc::new(FixedSigner));
        let token = factory.create_token_at(0).unwrap();
        assert!(!format!("{token:?}").contains("c2ln"));
    }
}
