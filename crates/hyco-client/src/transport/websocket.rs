//! WebSocket transport for relay sessions.
//!
//! Each relay session is one WebSocket connection. The stream is split so
//! the session writer owns the sink and the receive loop owns the stream;
//! neither half is shared behind a lock.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hyco_core::error::{HycoError, HycoResult};
use hyco_core::transport::{BoxFuture, Connection, Connector, Frame, FrameSink, FrameSource};

use super::ensure_websocket_uri;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials relay URIs over WebSocket (TLS via rustls for `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }

    async fn dial(uri: &str, headers: &[(String, String)]) -> HycoResult<Connection> {
        ensure_websocket_uri(uri)?;
        install_crypto_provider();

        let mut request = uri
            .into_client_request()
            .map_err(|e| HycoError::Transport(format!("invalid relay URI {uri}: {e}")))?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HycoError::Transport(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HycoError::Transport(format!("invalid value for header {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, response) = connect_async(request).await.map_err(dial_error)?;
        tracing::debug!(status = %response.status(), "WebSocket upgrade complete");

        let (sink, stream) = ws_stream.split();
        Ok(Connection {
            sink: Box::new(WsSink { sink, closed: false }),
            source: Box::new(WsSource { stream }),
        })
    }
}

impl Connector for WebSocketConnector {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, HycoResult<Connection>> {
        Box::pin(Self::dial(uri, headers))
    }
}

/// Use ring as the process-wide rustls provider; a no-op if one is set.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Keep the HTTP status of a rejected upgrade in the error text.
fn dial_error(e: tungstenite::Error) -> HycoError {
    match e {
        tungstenite::Error::Http(response) => HycoError::Transport(format!(
            "relay rejected WebSocket upgrade: {}",
            response.status()
        )),
        other => HycoError::Transport(format!("WebSocket connect error: {other}")),
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

impl FrameSink for WsSink {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, HycoResult<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(HycoError::Transport("connection already closed".into()));
            }
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(data) => Message::Binary(data),
                Frame::Ping(data) => Message::Ping(data),
                Frame::Pong(data) => Message::Pong(data),
                Frame::Close => Message::Close(None),
            };
            self.sink
                .send(message)
                .await
                .map_err(|e| HycoError::Transport(format!("WS write error: {e}")))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, HycoResult<()>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                if let Err(e) = self.sink.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "sending close frame failed");
                }
                if let Err(e) = self.sink.close().await {
                    tracing::debug!(error = %e, "closing WebSocket sink failed");
                }
            }
            Ok(())
        })
    }
}

struct WsSource {
    stream: SplitStream<WsStream>,
}

impl FrameSource for WsSource {
    fn recv(&mut self) -> BoxFuture<'_, HycoResult<Frame>> {
        Box::pin(async move {
            loop {
                let message = match self.stream.next().await {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        return Err(HycoError::Transport(format!("WS read error: {e}")))
                    }
                    None => return Err(HycoError::Transport("connection closed".into())),
                };

                return Ok(match message {
                    Message::Text(text) => Frame::Text(text),
                    Message::Binary(data) => Frame::Binary(data),
                    Message::Pong(data) => Frame::Pong(data),
                    Message::Close(frame) => {
                        tracing::debug!(?frame, "WebSocket close frame received");
                        Frame::Close
                    }
                    // tungstenite queues the pong reply itself.
                    Message::Ping(_) | Message::Frame(_) => continue,
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_websocket_uri() {
        let connector = WebSocketConnector::new();
        let err = connector.connect("https://example.com/x", &[]).await.err().unwrap();
        assert!(matches!(err, HycoError::Transport(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_header_name() {
        let connector = WebSocketConnector::new();
        let headers = vec![("bad header".to_string(), "v".to_string())];
        let err = connector
            .connect("ws://127.0.0.1:9/x", &headers)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("invalid header name"));
    }

    #[tokio::test]
    async fn dial_failure_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::new();
        let uri = format!("ws://{addr}/$hc/p");
        let err = connector.connect(&uri, &[]).await.err().unwrap();
        assert!(matches!(err, HycoError::Transport(_)));
    }
}
