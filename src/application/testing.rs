// In-memory transport and helpers for exercising the stream layer without sockets
use crate::application::frame_assets::{FrameAsset, FrameHandle, FrameReleaser};
use crate::application::stream_transport::{
    Endpoint, EndpointResolver, RawMessage, ResolveError, StreamConnection, StreamTransport,
    TransportError,
};
use crate::domain::road::{RoadId, StreamKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn url_for(road: &str, kind: StreamKind) -> String {
    format!("mock://{}/{}", kind, road)
}

pub struct StaticResolver;

impl EndpointResolver for StaticResolver {
    fn resolve(&self, road: &RoadId, kind: StreamKind) -> Result<Endpoint, ResolveError> {
        Ok(Endpoint {
            url: url_for(road.as_str(), kind),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    Refuse,
    Hang,
}

enum Incoming {
    Message(RawMessage),
    Fail(String),
    Close,
}

/// Drives one accepted connection from the test side.
#[derive(Clone)]
pub struct ConnectionControl {
    tx: mpsc::UnboundedSender<Incoming>,
}

impl ConnectionControl {
    pub fn send_text(&self, text: &str) {
        let _ = self.tx.send(Incoming::Message(RawMessage::Text(text.to_string())));
    }

    pub fn send_binary(&self, bytes: &'static [u8]) {
        let _ = self.tx.send(Incoming::Message(RawMessage::Binary(Bytes::from_static(bytes))));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Incoming::Fail(reason.to_string()));
    }

    pub fn close(&self) {
        let _ = self.tx.send(Incoming::Close);
    }
}

/// Accepts every handshake unless a refusal or hang is queued for the URL.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    controls: Mutex<HashMap<String, ConnectionControl>>,
    open: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self, url: &str, times: usize) {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.entry(url.to_string()).or_default();
        queue.extend(std::iter::repeat_n(Script::Refuse, times));
    }

    pub fn hang(&self, url: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(url.to_string()).or_default().push_back(Script::Hang);
    }

    pub fn attempts(&self, url: &str) -> Vec<Instant> {
        self.attempts.lock().unwrap().get(url).cloned().unwrap_or_default()
    }

    /// Control of the most recently accepted connection for `url`.
    pub fn control(&self, url: &str) -> Option<ConnectionControl> {
        self.controls.lock().unwrap().get(url).cloned()
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn StreamConnection>, TransportError> {
        self.attempts
            .lock()
            .unwrap()
            .entry(endpoint.url.clone())
            .or_default()
            .push(Instant::now());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&endpoint.url)
            .and_then(|queue| queue.pop_front());

        match script {
            Some(Script::Refuse) => Err(TransportError::Refused(endpoint.url.clone())),
            Some(Script::Hang) => std::future::pending().await,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.controls
                    .lock()
                    .unwrap()
                    .insert(endpoint.url.clone(), ConnectionControl { tx });
                self.open.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedConnection {
                    rx,
                    open: self.open.clone(),
                    closed: false,
                }))
            }
        }
    }
}

struct ScriptedConnection {
    rx: mpsc::UnboundedReceiver<Incoming>,
    open: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn next_message(&mut self) -> Option<Result<RawMessage, TransportError>> {
        if self.closed {
            return None;
        }
        match self.rx.recv().await {
            Some(Incoming::Message(message)) => Some(Ok(message)),
            Some(Incoming::Fail(reason)) => Some(Err(TransportError::Lost(reason))),
            Some(Incoming::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Records every released handle in order.
#[derive(Default)]
pub struct RecordingReleaser {
    released: Mutex<Vec<FrameHandle>>,
}

impl RecordingReleaser {
    pub fn released(&self) -> Vec<FrameHandle> {
        self.released.lock().unwrap().clone()
    }
}

impl FrameReleaser for RecordingReleaser {
    fn release(&self, asset: &FrameAsset) {
        self.released.lock().unwrap().push(asset.handle);
    }
}
