//! Abstract frame transport for relay sessions.
//!
//! A [`Connector`] dials a URI and yields a [`Connection`], split into a
//! [`FrameSink`] (owned by the session's single writer task) and a
//! [`FrameSource`] (owned by the receive loop).

use std::future::Future;
use std::pin::Pin;

use crate::error::HycoResult;

/// Boxed future used by the object-safe transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of a WebSocket frame, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

/// One discrete WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
            Frame::Ping(_) => FrameKind::Ping,
            Frame::Pong(_) => FrameKind::Pong,
            Frame::Close => FrameKind::Close,
        }
    }

    /// Payload bytes (empty for `Close`).
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Text(s) => s.as_bytes(),
            Frame::Binary(b) | Frame::Ping(b) | Frame::Pong(b) => b,
            Frame::Close => &[],
        }
    }
}

/// Write half of a connection.
pub trait FrameSink: Send {
    /// Send one frame.
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, HycoResult<()>>;

    /// Close the connection. Idempotent.
    fn close(&mut self) -> BoxFuture<'_, HycoResult<()>>;
}

/// Read half of a connection.
pub trait FrameSource: Send {
    /// Receive the next frame. Errors once the connection is gone.
    fn recv(&mut self) -> BoxFuture<'_, HycoResult<Frame>>;
}

/// An open connection, already split into halves.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Dials relay URIs.
pub trait Connector: Send + Sync {
    /// Open a connection to `uri`, sending `headers` with the upgrade request.
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, HycoResult<Connection>>;
}
