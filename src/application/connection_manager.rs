// Stream connection manager - one live connection per (road, kind) with capped backoff
use crate::application::backoff::Backoff;
use crate::application::stream_transport::{
    EndpointResolver, ResolveError, StreamConnection, StreamTransport, TransportError,
};
use crate::domain::road::{ConnectionState, StreamKey, StreamKind};
use crate::infrastructure::message_codec::{self, DecodeError, Decoded};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConnectionPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Attempt window: a handshake that is not open by then counts as failed.
    pub connect_timeout: Duration,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct StreamEvent {
    pub key: StreamKey,
    /// Identifies the manager instance; events from replaced managers are stale.
    pub session: u64,
    pub at: DateTime<Utc>,
    pub payload: StreamPayload,
}

#[derive(Debug)]
pub enum StreamPayload {
    State(ConnectionState),
    Decoded(Decoded),
    DecodeFailed(String),
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

enum Inbound {
    Message(Decoded, DateTime<Utc>),
    Malformed(DecodeError),
    Lost(String),
}

enum PumpExit {
    Cancelled,
    Lost(String),
}

/// Handle to the task that owns one connection. Dropping the handle closes it.
pub struct StreamConnectionManager {
    key: StreamKey,
    session: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamConnectionManager {
    pub fn open(
        key: StreamKey,
        session: u64,
        transport: Arc<dyn StreamTransport>,
        resolver: Arc<dyn EndpointResolver>,
        policy: ConnectionPolicy,
        events: mpsc::Sender<StreamEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = ConnectionWorker {
            key: key.clone(),
            session,
            transport,
            resolver,
            backoff: Backoff::new(policy.base_delay, policy.max_delay),
            connect_timeout: policy.connect_timeout,
            events,
            cancel: cancel.clone(),
        };

        debug!(stream = %key, session, "spawning stream manager");
        let task = tokio::spawn(worker.run());

        Self {
            key,
            session,
            cancel,
            task: Some(task),
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Terminal. Interrupts any pending handshake, receive or backoff timer.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(stream = %self.key, session = self.session, "closing stream manager");
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the connection task to finish after `close`.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(stream = %self.key, error = %e, "stream task ended abnormally");
            }
        }
    }
}

impl Drop for StreamConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ConnectionWorker {
    key: StreamKey,
    session: u64,
    transport: Arc<dyn StreamTransport>,
    resolver: Arc<dyn EndpointResolver>,
    backoff: Backoff,
    connect_timeout: Duration,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl ConnectionWorker {
    async fn run(mut self) {
        loop {
            if !self.emit(StreamPayload::State(ConnectionState::Connecting)).await {
                break;
            }

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                attempt = self.attempt() => attempt,
            };

            match attempt {
                Ok(mut connection) => {
                    self.backoff.reset();
                    if !self.emit(StreamPayload::State(ConnectionState::Open)).await {
                        connection.close().await;
                        break;
                    }
                    info!(stream = %self.key, session = self.session, "stream open");

                    match self.pump(connection.as_mut()).await {
                        PumpExit::Cancelled => {
                            connection.close().await;
                            break;
                        }
                        PumpExit::Lost(reason) => {
                            warn!(stream = %self.key, session = self.session, %reason, "stream lost");
                        }
                    }
                }
                Err(e) => {
                    warn!(stream = %self.key, session = self.session, error = %e, "connection attempt failed");
                }
            }

            if !self.emit(StreamPayload::State(ConnectionState::Reconnecting)).await {
                break;
            }

            let delay = self.backoff.next_delay();
            debug!(stream = %self.key, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // Best effort: the receiver may be full or gone once we are cancelled.
        let _ = self.events.try_send(self.event(StreamPayload::State(ConnectionState::Closed), Utc::now()));
        debug!(stream = %self.key, session = self.session, "stream manager closed");
    }

    async fn attempt(&self) -> Result<Box<dyn StreamConnection>, AttemptError> {
        let endpoint = self.resolver.resolve(&self.key.road, self.key.kind)?;
        debug!(stream = %self.key, url = %endpoint.url, "connecting");

        match tokio::time::timeout(self.connect_timeout, self.transport.connect(&endpoint)).await {
            Ok(connection) => Ok(connection?),
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }

    async fn pump(&self, connection: &mut dyn StreamConnection) -> PumpExit {
        let messages = inbound(self.key.kind, connection);
        tokio::pin!(messages);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                next = messages.next() => next,
            };

            let delivered = match next {
                Some(Inbound::Message(decoded, at)) => {
                    self.emit_at(StreamPayload::Decoded(decoded), at).await
                }
                Some(Inbound::Malformed(e)) => {
                    warn!(stream = %self.key, session = self.session, error = %e, "dropping undecodable message");
                    self.emit(StreamPayload::DecodeFailed(e.to_string())).await
                }
                Some(Inbound::Lost(reason)) => return PumpExit::Lost(reason),
                None => return PumpExit::Lost("stream ended".to_string()),
            };

            if !delivered {
                return PumpExit::Cancelled;
            }
        }
    }

    fn event(&self, payload: StreamPayload, at: DateTime<Utc>) -> StreamEvent {
        StreamEvent {
            key: self.key.clone(),
            session: self.session,
            at,
            payload,
        }
    }

    async fn emit(&self, payload: StreamPayload) -> bool {
        self.emit_at(payload, Utc::now()).await
    }

    /// Returns false when the manager is cancelled or nobody is listening anymore.
    async fn emit_at(&self, payload: StreamPayload, at: DateTime<Utc>) -> bool {
        let event = self.event(payload, at);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }
}

/// Lazy sequence of decoded messages for one connection. Ends after the first
/// transport failure or close; a new connection gets a new sequence.
fn inbound(kind: StreamKind, connection: &mut dyn StreamConnection) -> impl Stream<Item = Inbound> + Send + '_ {
    async_stream::stream! {
        loop {
            match connection.next_message().await {
                Some(Ok(raw)) => {
                    let at = Utc::now();
                    match message_codec::decode(kind, raw, at) {
                        Ok(decoded) => yield Inbound::Message(decoded, at),
                        Err(e) => yield Inbound::Malformed(e),
                    }
                }
                Some(Err(e)) => {
                    yield Inbound::Lost(e.to_string());
                    break;
                }
                None => {
                    yield Inbound::Lost("closed by peer".to_string());
                    break;
                }
            }
        }
    }
}
