//! Control and data sessions.
//!
//! A session owns one relay connection and runs three cooperating tasks:
//!
//! - the receive loop, which decodes inbound header frames and dispatches
//!   them (in the caller's task)
//! - the writer, the only task that touches the sink; it drains a bounded
//!   outbound queue and interleaves keepalive pings
//! - the renewal worker (control sessions only), which enqueues a fresh
//!   `renewToken` envelope before the current token expires
//!
//! An `accept` on the control channel spawns a data session that dials the
//! rendezvous address and runs the same receive loop. Data sessions are
//! children of their control session: tearing the control session down
//! cancels and awaits every data session it started.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use hyco_core::codec;
use hyco_core::endpoint::AUTHORIZATION_HEADER;
use hyco_core::error::{HycoError, HycoResult};
use hyco_core::messages::{
    AcceptEnvelope, Envelope, RenewTokenEnvelope, RequestEnvelope, ResponseEnvelope,
};
use hyco_core::token::{TokenFactory, TOKEN_TTL_SECS};
use hyco_core::transport::{BoxFuture, Connection, Connector, Frame, FrameSink, FrameSource};

use crate::handler::{RelayedRequest, RequestHandler, NO_BODY};
use crate::registry::SessionRegistry;

/// Keepalive ping cadence.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
/// Token renewal cadence; must stay below the token lifetime.
pub const DEFAULT_RENEW_INTERVAL: Duration = Duration::from_secs(59 * 60);
/// Outbound queue capacity. Producers wait when it is full.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Header carrying the accepting client's endpoint on a data session dial.
pub const REMOTE_ENDPOINT_HEADER: &str = "remoteEndpoint";

/// Which channel a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The listener's long-lived channel.
    Control,
    /// A per-client rendezvous channel.
    Data,
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Listening,
    /// Receive loop has stopped; workers are shutting down.
    Draining,
    Closed,
}

/// Timing and queueing knobs shared by every session of a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub ping_interval: Duration,
    pub renew_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            renew_interval: DEFAULT_RENEW_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Cadence of the minimal listener: a ping every two seconds and a
    /// renewal every minute.
    pub fn bare() -> Self {
        Self {
            ping_interval: Duration::from_secs(2),
            renew_interval: Duration::from_secs(60),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn validate(&self) -> HycoResult<()> {
        if self.ping_interval.is_zero() {
            return Err(HycoError::Config("ping interval must be non-zero".into()));
        }
        if self.renew_interval.is_zero() || self.renew_interval.as_secs() >= TOKEN_TTL_SECS {
            return Err(HycoError::Config(format!(
                "renew interval must be between 1s and {TOKEN_TTL_SECS}s, got {:?}",
                self.renew_interval
            )));
        }
        if self.queue_capacity == 0 {
            return Err(HycoError::Config("queue capacity must be non-zero".into()));
        }
        Ok(())
    }
}

/// Collaborators shared by a control session and the data sessions it
/// spawns.
#[derive(Clone)]
pub struct SessionContext {
    pub connector: Arc<dyn Connector>,
    pub handler: Arc<dyn RequestHandler>,
    pub registry: SessionRegistry,
    pub config: SessionConfig,
}

/// A connected session, ready to [`run`](Session::run).
pub struct Session {
    id: String,
    role: Role,
    connection: Connection,
    context: SessionContext,
    renewal: Option<Arc<TokenFactory>>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Dial the listener URI for `correlation_id` with a fresh token.
    ///
    /// `state` moves to `Closed` if the dial fails.
    pub async fn connect_control(
        context: SessionContext,
        tokens: Arc<TokenFactory>,
        correlation_id: &str,
        state: watch::Sender<SessionState>,
    ) -> HycoResult<Self> {
        state.send_replace(SessionState::Connecting);

        let dial = async {
            let uri = tokens.endpoint().listener_uri(correlation_id);
            let token = tokens.create_token()?;
            let headers = vec![(AUTHORIZATION_HEADER.to_string(), token.header_value())];
            debug!(uri = %uri, expiry = token.expiry, "dialing listener channel");
            context.connector.connect(&uri, &headers).await
        };

        let dialed = dial.await;
        match dialed {
            Ok(connection) => Ok(Self {
                id: correlation_id.to_string(),
                role: Role::Control,
                connection,
                context,
                renewal: Some(tokens),
                state,
            }),
            Err(e) => {
                state.send_replace(SessionState::Closed);
                Err(e)
            }
        }
    }

    /// Dial the rendezvous address of an `accept` envelope, verbatim.
    pub async fn connect_data(context: SessionContext, accept: &AcceptEnvelope) -> HycoResult<Self> {
        let mut headers = Vec::new();
        if let Some(remote) = &accept.remote_endpoint {
            headers.push((
                REMOTE_ENDPOINT_HEADER.to_string(),
                serde_json::to_string(remote)?,
            ));
        }

        let connection = context.connector.connect(&accept.address, &headers).await?;
        let (state, _) = watch::channel(SessionState::Connecting);
        Ok(Self {
            id: accept.id.clone(),
            role: Role::Data,
            connection,
            context,
            renewal: None,
            state,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Serve the session until the relay closes it, a fatal error occurs,
    /// or `shutdown` fires.
    ///
    /// A shutdown or a clean close yields `Ok(())`. Otherwise the first
    /// fatal error from the receive loop or the writer is returned.
    pub async fn run(self, shutdown: CancellationToken) -> HycoResult<()> {
        let Session {
            id,
            role,
            connection,
            context,
            renewal,
            state,
        } = self;
        let Connection { sink, source } = connection;

        state.send_replace(SessionState::Listening);
        info!(id = %id, role = ?role, "session listening");

        let cancel = shutdown.child_token();
        let (queue_tx, queue_rx) = mpsc::channel(context.config.queue_capacity);

        let writer = tokio::spawn(write_loop(
            sink,
            queue_rx,
            context.config.ping_interval,
            cancel.clone(),
            id.clone(),
        ));

        let renewal_cancel = cancel.child_token();
        let renewer = renewal.map(|tokens| {
            tokio::spawn(renew_loop(
                tokens,
                queue_tx.clone(),
                context.config.renew_interval,
                renewal_cancel.clone(),
                id.clone(),
            ))
        });

        let mut receiver = Receiver {
            id: id.clone(),
            context,
            source,
            queue: queue_tx,
            cancel: cancel.clone(),
            data_sessions: JoinSet::new(),
        };
        let result = receiver.run().await;

        state.send_replace(SessionState::Draining);
        if let Err(e) = &result {
            error!(id = %id, role = ?role, error = %e, "receive loop failed");
        }

        renewal_cancel.cancel();
        if let Some(renewer) = renewer {
            if let Err(e) = renewer.await {
                warn!(id = %id, error = %e, "renewal task panicked");
            }
        }

        cancel.cancel();
        receiver.shutdown_data_sessions().await;

        // Dropping the receiver drops the last queue sender; the writer
        // flushes what is queued and closes the sink.
        drop(receiver);
        let writer_result = match writer.await {
            Ok(result) => result,
            Err(e) => Err(HycoError::Transport(format!("writer task panicked: {e}"))),
        };

        state.send_replace(SessionState::Closed);
        info!(id = %id, role = ?role, "session closed");

        match (result, writer_result) {
            (Err(e), _) => Err(e),
            (Ok(()), writer_result) => writer_result,
        }
    }
}

struct Receiver {
    id: String,
    context: SessionContext,
    source: Box<dyn FrameSource>,
    queue: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    data_sessions: JoinSet<()>,
}

impl Receiver {
    async fn run(&mut self) -> HycoResult<()> {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(id = %self.id, "receive loop cancelled");
                    return Ok(());
                }
                Some(joined) = self.data_sessions.join_next(), if !self.data_sessions.is_empty() => {
                    if let Err(e) = joined {
                        warn!(id = %self.id, error = %e, "data session task panicked");
                    }
                    continue;
                }
                frame = self.source.recv() => frame?,
            };

            match frame {
                Frame::Pong(_) => trace!(id = %self.id, "pong"),
                Frame::Close => {
                    info!(id = %self.id, "relay closed the connection");
                    return Ok(());
                }
                Frame::Text(text) => {
                    trace!(id = %self.id, header = %text, "header frame");
                    let envelope = codec::decode_text(&text)?;
                    self.dispatch(envelope).await?;
                }
                other => {
                    return Err(HycoError::ProtocolViolation(format!(
                        "expected a text header frame, got {:?}",
                        other.kind()
                    )));
                }
            }
        }
    }

    async fn dispatch(&mut self, envelope: Envelope) -> HycoResult<()> {
        match envelope {
            Envelope::Accept(accept) => match self.accept(accept).await {
                Err(e) if !e.is_fatal() => {
                    warn!(id = %self.id, error = %e, "dropping accept");
                    Ok(())
                }
                other => other,
            },
            Envelope::Request(request) => self.handle_request(request).await,
            other => Err(HycoError::Decode(format!(
                "unexpected inbound envelope {}",
                other.id()
            ))),
        }
    }

    async fn accept(&mut self, accept: AcceptEnvelope) -> HycoResult<()> {
        if !self.context.registry.reserve(&accept.id, &accept.address).await {
            return Err(HycoError::DuplicateAccept(accept.id));
        }
        info!(parent = %self.id, id = %accept.id, address = %accept.address, "accepting client connection");

        self.data_sessions.spawn(run_data_session(
            self.context.clone(),
            accept,
            self.cancel.clone(),
        ));
        Ok(())
    }

    /// Acknowledge, read the body if one was declared, then hand the
    /// request to the handler.
    async fn handle_request(&mut self, request: RequestEnvelope) -> HycoResult<()> {
        if request.id.is_empty() {
            return Err(HycoError::Decode("request envelope without id".into()));
        }

        let ack = Envelope::Response(ResponseEnvelope::accepted(&request.id));
        enqueue(&self.queue, Frame::Text(codec::encode(&ack)?)).await?;

        let body = if request.has_body {
            self.read_body(&request.id).await?
        } else {
            NO_BODY.to_vec()
        };

        let relayed = RelayedRequest::from_envelope(request, body);
        debug!(
            id = %relayed.id,
            method = %relayed.method,
            target = %relayed.target,
            body_len = relayed.body.len(),
            "handling relayed request"
        );
        let payload = self.context.handler.handle(&relayed);
        enqueue(&self.queue, Frame::Binary(payload.into_bytes())).await
    }

    async fn read_body(&mut self, request_id: &str) -> HycoResult<Vec<u8>> {
        let frame = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(HycoError::Transport(format!(
                    "session closed while reading body of request {request_id}"
                )));
            }
            frame = self.source.recv() => frame?,
        };
        match frame {
            Frame::Text(text) => Ok(text.into_bytes()),
            Frame::Binary(data) => Ok(data),
            other => Err(HycoError::ProtocolViolation(format!(
                "request {request_id}: expected a body frame, got {:?}",
                other.kind()
            ))),
        }
    }

    async fn shutdown_data_sessions(&mut self) {
        if !self.data_sessions.is_empty() {
            debug!(id = %self.id, count = self.data_sessions.len(), "waiting for data sessions");
        }
        while let Some(joined) = self.data_sessions.join_next().await {
            if let Err(e) = joined {
                warn!(id = %self.id, error = %e, "data session task panicked");
            }
        }
    }
}

async fn enqueue(queue: &mpsc::Sender<Frame>, frame: Frame) -> HycoResult<()> {
    queue
        .send(frame)
        .await
        .map_err(|_| HycoError::Transport("outbound queue closed".into()))
}

/// Dial, serve and release one data session. Boxed so the control
/// session's future does not contain itself.
fn run_data_session(
    context: SessionContext,
    accept: AcceptEnvelope,
    shutdown: CancellationToken,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let registry = context.registry.clone();
        let dialed = tokio::select! {
            _ = shutdown.cancelled() => None,
            dialed = Session::connect_data(context, &accept) => Some(dialed),
        };
        let result = match dialed {
            Some(Ok(session)) => session.run(shutdown).await,
            Some(Err(e)) => Err(e),
            None => {
                debug!(id = %accept.id, "shutdown before rendezvous dial completed");
                Ok(())
            }
        };
        match result {
            Ok(()) => info!(id = %accept.id, "data session ended"),
            Err(e) => warn!(id = %accept.id, error = %e, "data session failed"),
        }
        registry.release(&accept.id).await;
    })
}

/// Sole writer of a session's sink.
///
/// Exits when every queue sender is gone (after flushing) or on the first
/// send failure, which also cancels the session.
async fn write_loop(
    mut sink: Box<dyn FrameSink>,
    mut queue: mpsc::Receiver<Frame>,
    ping_interval: Duration,
    cancel: CancellationToken,
    id: String,
) -> HycoResult<()> {
    let mut ticker = time::interval(ping_interval);
    ticker.tick().await; // skip the immediate first tick

    let result = loop {
        let frame = tokio::select! {
            _ = ticker.tick() => Frame::Ping(Vec::new()),
            next = queue.recv() => match next {
                Some(frame) => frame,
                None => break Ok(()),
            },
        };
        trace!(id = %id, kind = ?frame.kind(), len = frame.payload().len(), "writing frame");
        if let Err(e) = sink.send(frame).await {
            break Err(e);
        }
    };

    if let Err(e) = sink.close().await {
        debug!(id = %id, error = %e, "close failed");
    }
    if let Err(e) = &result {
        error!(id = %id, error = %e, "write failed, closing session");
        cancel.cancel();
    }
    debug!(id = %id, "writer stopped");
    result
}

/// Periodically enqueue a `renewToken` envelope. A full queue delays the
/// renewal rather than dropping it.
async fn renew_loop(
    tokens: Arc<TokenFactory>,
    queue: mpsc::Sender<Frame>,
    interval: Duration,
    cancel: CancellationToken,
    id: String,
) {
    loop {
        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }

        let token = match tokens.create_token() {
            Ok(token) => token,
            Err(e) => {
                error!(id = %id, error = %e, "unable to sign renewal token");
                continue;
            }
        };
        let envelope = Envelope::RenewToken(RenewTokenEnvelope {
            token: token.header_value(),
        });
        let text = match codec::encode(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!(id = %id, error = %e, "unable to encode renewal");
                continue;
            }
        };

        info!(id = %id, expiry = token.expiry, "renewing relay token");
        tokio::select! {
            sent = queue.send(Frame::Text(text)) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    debug!(id = %id, "renewal stopped");
}
