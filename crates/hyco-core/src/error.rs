use thiserror::Error;

/// Errors produced by the hyco relay protocol layer.
#[derive(Debug, Error)]
pub enum HycoError {
    #[error("signer error: {0}")]
    Signer(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("duplicate accept for connection {0}")]
    DuplicateAccept(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(String),
}

impl HycoError {
    /// Whether this error terminates the session that observed it.
    ///
    /// A duplicate accept only drops the offending envelope.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HycoError::DuplicateAccept(_))
    }
}

impl From<serde_json::Error> for HycoError {
    fn from(e: serde_json::Error) -> Self {
        HycoError::Decode(e.to_string())
    }
}

pub type HycoResult<T> = Result<T, HycoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_accept_is_not_fatal() {
        assert!(!HycoError::DuplicateAccept("a1".into()).is_fatal());
        assert!(HycoError::Decode("bad".into()).is_fatal());
        assert!(HycoError::Transport("reset".into()).is_fatal());
        assert!(HycoError::ProtocolViolation("binary header".into()).is_fatal());
    }

    #[test]
    fn json_errors_map_to_decode() {
        let err: HycoError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, HycoError::Decode(_)));
    }
}
