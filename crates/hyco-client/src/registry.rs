//! Registry of live data sessions.
//!
//! Each accepted client connection is keyed by its relay-assigned id. An id
//! is reserved before the data session dials and released after the session
//! has fully torn down, so a duplicate `accept` can never start a second
//! session for the same client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::debug;

/// A reserved data session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Relay-assigned correlation id.
    pub id: String,
    /// Rendezvous address the data session dialed.
    pub address: String,
    /// When the id was reserved.
    pub reserved_at: Instant,
}

/// Correlation id → data session. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id`. Returns `false` if it is already reserved, in which
    /// case the caller must not start a session.
    pub async fn reserve(&self, id: &str, address: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return false;
        }
        sessions.insert(
            id.to_string(),
            SessionEntry {
                id: id.to_string(),
                address: address.to_string(),
                reserved_at: Instant::now(),
            },
        );
        debug!(id = %id, "data session reserved");
        true
    }

    /// Release `id`. No-op if it is not reserved.
    pub async fn release(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            debug!(id = %id, "data session released");
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Snapshot of all reserved sessions.
    pub async fn list(&self) -> Vec<SessionEntry> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of reserved sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_once_until_released() {
        let registry = SessionRegistry::new();
        assert!(registry.reserve("a1", "wss://x/y").await);
        assert!(!registry.reserve("a1", "wss://x/other").await);
        assert_eq!(registry.count().await, 1);
        assert_eq!(registry.list().await[0].address, "wss://x/y");

        registry.release("a1").await;
        assert!(!registry.contains("a1").await);
        assert!(registry.reserve("a1", "wss://x/y").await);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.release("missing").await;
        assert!(registry.reserve("a1", "").await);
        registry.release("a1").await;
        registry.release("a1").await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_reserve_admits_exactly_one() {
        let registry = SessionRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.reserve("dup", "").await }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }
}
