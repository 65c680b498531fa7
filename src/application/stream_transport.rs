// Transport seam for per-road push connections
use crate::domain::road::{RoadId, StreamKind};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// A resolved, push-capable endpoint for one (road, kind) stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connection attempt timed out")]
    Timeout,
    #[error("connection lost: {0}")]
    Lost(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no endpoint configured for {0} streams")]
    Missing(StreamKind),
    #[error("endpoint {0} is not a push-capable (ws/wss) URL")]
    NotPushCapable(String),
}

pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, road: &RoadId, kind: StreamKind) -> Result<Endpoint, ResolveError>;
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Perform the handshake. Callers bound this with their own attempt window.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn StreamConnection>, TransportError>;
}

#[async_trait]
pub trait StreamConnection: Send {
    /// Next inbound message. `None` means the peer closed the connection.
    async fn next_message(&mut self) -> Option<Result<RawMessage, TransportError>>;

    async fn close(&mut self);
}
