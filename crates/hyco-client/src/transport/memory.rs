//! In-process transport for scripting a relay.
//!
//! Every dial through a [`MemoryConnector`] produces a connection whose far
//! end is a [`MemoryPeer`]. The peer pushes inbound frames to the session
//! and observes everything the session writes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use hyco_core::error::{HycoError, HycoResult};
use hyco_core::transport::{BoxFuture, Connection, Connector, Frame, FrameSink, FrameSource};

/// Buffer of frames queued toward the session.
const PEER_INBOUND_CAPACITY: usize = 64;

/// The relay side of an in-memory connection.
pub struct MemoryPeer {
    /// URI the session dialed.
    pub uri: String,
    /// Headers sent with the dial.
    pub headers: Vec<(String, String)>,
    inbound: Option<mpsc::Sender<Frame>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Deliver a frame to the session's receive loop.
    pub async fn push(&self, frame: Frame) -> HycoResult<()> {
        let inbound = self
            .inbound
            .as_ref()
            .ok_or_else(|| HycoError::Transport("peer already hung up".into()))?;
        inbound
            .send(frame)
            .await
            .map_err(|_| HycoError::Transport("session stopped reading".into()))
    }

    /// Deliver a text frame.
    pub async fn push_text(&self, text: &str) -> HycoResult<()> {
        self.push(Frame::Text(text.to_string())).await
    }

    /// Next frame written by the session; `None` once the sink is gone.
    pub async fn next_written(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next written frame that is not a keepalive ping.
    pub async fn next_non_ping(&mut self) -> Option<Frame> {
        loop {
            match self.outbound.recv().await {
                Some(Frame::Ping(_)) => continue,
                other => return other,
            }
        }
    }

    /// A written frame if one is already queued.
    pub fn try_written(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Drop the inbound side, making the session's next read fail.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Value of a dial header, if sent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Hands out in-memory connections and reports their peers.
pub struct MemoryConnector {
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>,
    refused: Mutex<HashSet<String>>,
    dialed: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
            refused: Mutex::new(HashSet::new()),
            dialed: Mutex::new(Vec::new()),
        })
    }

    /// Make future dials to `uri` fail.
    pub fn refuse(&self, uri: &str) {
        if let Ok(mut refused) = self.refused.lock() {
            refused.insert(uri.to_string());
        }
    }

    /// Wait for the next successful dial.
    pub async fn next_peer(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Every URI dialed so far, refused ones included.
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn open(&self, uri: &str, headers: &[(String, String)]) -> HycoResult<Connection> {
        if let Ok(mut dialed) = self.dialed.lock() {
            dialed.push(uri.to_string());
        }
        let refused = self
            .refused
            .lock()
            .map(|r| r.contains(uri))
            .unwrap_or(false);
        if refused {
            return Err(HycoError::Transport(format!("connection refused: {uri}")));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(PEER_INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            uri: uri.to_string(),
            headers: headers.to_vec(),
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| HycoError::Transport("memory connector dropped".into()))?;

        Ok(Connection {
            sink: Box::new(MemorySink {
                tx: Some(outbound_tx),
            }),
            source: Box::new(MemorySource { rx: inbound_rx }),
        })
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, HycoResult<Connection>> {
        Box::pin(async move { self.open(uri, headers) })
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Frame>>,
}

impl FrameSink for MemorySink {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, HycoResult<()>> {
        Box::pin(async move {
            let tx = self
                .tx
                .as_ref()
                .ok_or_else(|| HycoError::Transport("connection already closed".into()))?;
            tx.send(frame)
                .map_err(|_| HycoError::Transport("peer went away".into()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, HycoResult<()>> {
        Box::pin(async move {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(Frame::Close);
            }
            Ok(())
        })
    }
}

struct MemorySource {
    rx: mpsc::Receiver<Frame>,
}

impl FrameSource for MemorySource {
    fn recv(&mut self) -> BoxFuture<'_, HycoResult<Frame>> {
        Box::pin(async move {
            self.rx
                .recv()
                .await
                .ok_or_else(|| HycoError::Transport("connection closed".into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let connector = MemoryConnector::new();
        let headers = vec![("X-Test".to_string(), "1".to_string())];
        let mut conn = connector.connect("ws://relay/a", &headers).await.ok().unwrap();
        let mut peer = connector.next_peer().await.unwrap();

        assert_eq!(peer.uri, "ws://relay/a");
        assert_eq!(peer.header("x-test"), Some("1"));

        peer.push_text("hello").await.unwrap();
        assert_eq!(conn.source.recv().await.unwrap(), Frame::Text("hello".into()));

        conn.sink.send(Frame::Binary(vec![7])).await.unwrap();
        assert_eq!(peer.next_written().await, Some(Frame::Binary(vec![7])));

        conn.sink.close().await.unwrap();
        assert_eq!(peer.next_written().await, Some(Frame::Close));
        assert!(conn.sink.send(Frame::Text("late".into())).await.is_err());
    }

    #[tokio::test]
    async fn hang_up_fails_reads() {
        let connector = MemoryConnector::new();
        let mut conn = connector.connect("ws://relay/a", &[]).await.ok().unwrap();
        let mut peer = connector.next_peer().await.unwrap();
        peer.hang_up();
        assert!(conn.source.recv().await.is_err());
    }

    #[tokio::test]
    async fn refused_uri_fails_dial() {
        let connector = MemoryConnector::new();
        connector.refuse("ws://relay/down");
        assert!(connector.connect("ws://relay/down", &[]).await.is_err());
        assert_eq!(connector.dialed(), vec!["ws://relay/down".to_string()]);
    }
}
