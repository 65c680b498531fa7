// Multi-road orchestrator - converges live connections onto the desired road set
use crate::application::connection_manager::{
    ConnectionPolicy, StreamConnectionManager, StreamEvent, StreamPayload,
};
use crate::application::frame_assets::{FrameAsset, FrameAssetLifecycle, FrameReleaser};
use crate::application::history_aggregator::HistoryAggregator;
use crate::application::stream_transport::{EndpointResolver, StreamTransport};
use crate::domain::congestion::CongestionThresholds;
use crate::domain::history::{HistoryRecord, Metric};
use crate::domain::road::{ConnectionState, RoadId, StreamKey, StreamKind, dedup_roads};
use crate::domain::stats::{self, TrafficSummary};
use crate::domain::telemetry::{Presence, SnapshotMap, TelemetrySnapshot, TimeSeriesPoint};
use crate::infrastructure::message_codec::Decoded;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub policy: ConnectionPolicy,
    pub history_capacity: usize,
    pub channel_capacity: usize,
    pub thresholds: CongestionThresholds,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            policy: ConnectionPolicy::default(),
            history_capacity: crate::domain::history::DEFAULT_HISTORY_CAPACITY,
            channel_capacity: 256,
            thresholds: CongestionThresholds::default(),
        }
    }
}

/// Everything consumers can observe. Written only by the orchestrator.
struct LiveState {
    roads: Vec<RoadId>,
    snapshots: SnapshotMap,
    frames: FrameAssetLifecycle,
    states: HashMap<StreamKey, ConnectionState>,
    decode_failures: HashMap<StreamKey, u64>,
    history: HistoryAggregator,
}

impl LiveState {
    fn is_any_connected(&self) -> bool {
        self.states.values().any(ConnectionState::is_open)
    }
}

/// Cheap, cloneable read handle. Every call returns owned data taken under one read lock.
#[derive(Clone)]
pub struct DashboardView {
    state: Arc<RwLock<LiveState>>,
    thresholds: CongestionThresholds,
}

impl DashboardView {
    pub async fn roads(&self) -> Vec<RoadId> {
        self.state.read().await.roads.clone()
    }

    /// Roads with at least one decoded telemetry message.
    pub async fn traffic_data(&self) -> BTreeMap<RoadId, TelemetrySnapshot> {
        let state = self.state.read().await;
        state
            .snapshots
            .iter()
            .filter_map(|(road, snapshot)| match snapshot {
                Presence::Present(s) => Some((road.clone(), s.clone())),
                Presence::Absent => None,
            })
            .collect()
    }

    /// `None` when the road is not tracked at all.
    pub async fn telemetry(&self, road: &RoadId) -> Option<Presence<TelemetrySnapshot>> {
        self.state.read().await.snapshots.get(road).cloned()
    }

    pub async fn frame_data(&self) -> BTreeMap<RoadId, FrameAsset> {
        let state = self.state.read().await;
        state
            .frames
            .live()
            .map(|asset| (asset.road.clone(), asset.clone()))
            .collect()
    }

    pub async fn frame(&self, road: &RoadId) -> Option<FrameAsset> {
        self.state.read().await.frames.current(road).cloned()
    }

    pub async fn is_any_connected(&self) -> bool {
        self.state.read().await.is_any_connected()
    }

    pub async fn connection_states(&self) -> BTreeMap<StreamKey, ConnectionState> {
        let state = self.state.read().await;
        state
            .states
            .iter()
            .map(|(key, s)| (key.clone(), *s))
            .collect()
    }

    /// Connection states with their decode failure counts, read under one guard.
    pub async fn connectivity(&self) -> Vec<(StreamKey, ConnectionState, u64)> {
        let state = self.state.read().await;
        let mut report: Vec<_> = state
            .states
            .iter()
            .map(|(key, s)| {
                let failures = state.decode_failures.get(key).copied().unwrap_or(0);
                (key.clone(), *s, failures)
            })
            .collect();
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.state.read().await.history.records()
    }

    pub async fn series(&self, road: &RoadId, metric: Metric) -> Vec<TimeSeriesPoint> {
        self.state.read().await.history.series(road, metric)
    }

    pub async fn summary(&self) -> TrafficSummary {
        let state = self.state.read().await;
        stats::summarize(&state.snapshots, &state.roads, &self.thresholds)
    }
}

enum Control {
    ResetHistory,
}

pub struct MultiRoadOrchestrator {
    transport: Arc<dyn StreamTransport>,
    resolver: Arc<dyn EndpointResolver>,
    policy: ConnectionPolicy,
    thresholds: CongestionThresholds,
    managers: HashMap<StreamKey, StreamConnectionManager>,
    next_session: u64,
    state: Arc<RwLock<LiveState>>,
    events_tx: mpsc::Sender<StreamEvent>,
    events_rx: mpsc::Receiver<StreamEvent>,
}

impl MultiRoadOrchestrator {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        resolver: Arc<dyn EndpointResolver>,
        releaser: Arc<dyn FrameReleaser>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.channel_capacity.max(1));
        let state = LiveState {
            roads: Vec::new(),
            snapshots: SnapshotMap::new(),
            frames: FrameAssetLifecycle::new(releaser),
            states: HashMap::new(),
            decode_failures: HashMap::new(),
            history: HistoryAggregator::new(settings.history_capacity),
        };

        Self {
            transport,
            resolver,
            policy: settings.policy,
            thresholds: settings.thresholds,
            managers: HashMap::new(),
            next_session: 1,
            state: Arc::new(RwLock::new(state)),
            events_tx,
            events_rx,
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            state: self.state.clone(),
            thresholds: self.thresholds,
        }
    }

    /// Number of live managers, i.e. tracked roads times stream kinds.
    pub fn manager_count(&self) -> usize {
        self.managers.len()
    }

    pub fn is_managed(&self, key: &StreamKey) -> bool {
        self.managers.contains_key(key)
    }

    /// Converge onto `desired`. Removed roads lose their connections, telemetry and
    /// frame before this returns; new roads get one manager per stream kind.
    pub async fn reconcile(&mut self, desired: &[RoadId]) {
        let desired = dedup_roads(desired);
        let wanted: HashSet<&RoadId> = desired.iter().collect();
        let mut retired = Vec::new();

        {
            let mut state = self.state.write().await;
            let removed: Vec<RoadId> = state
                .roads
                .iter()
                .filter(|road| !wanted.contains(road))
                .cloned()
                .collect();

            for road in &removed {
                for kind in StreamKind::ALL {
                    let key = StreamKey::new(road.clone(), kind);
                    if let Some(manager) = self.managers.remove(&key) {
                        manager.close();
                        retired.push(manager);
                    }
                    state.states.remove(&key);
                    state.decode_failures.remove(&key);
                }
                state.snapshots.remove(road);
                let had_frame = state.frames.evict(road);
                info!(road = %road, had_frame, "road removed");
            }

            for road in &desired {
                state.snapshots.entry(road.clone()).or_insert(Presence::Absent);
                for kind in StreamKind::ALL {
                    let key = StreamKey::new(road.clone(), kind);
                    if self.managers.contains_key(&key) {
                        continue;
                    }
                    let session = self.next_session;
                    self.next_session += 1;
                    let manager = StreamConnectionManager::open(
                        key.clone(),
                        session,
                        self.transport.clone(),
                        self.resolver.clone(),
                        self.policy.clone(),
                        self.events_tx.clone(),
                    );
                    self.managers.insert(key.clone(), manager);
                    state.states.insert(key, ConnectionState::Idle);
                }
            }

            if state.roads != desired {
                info!(roads = desired.len(), removed = removed.len(), "membership reconciled");
            }
            state.roads = desired;
        }

        for mut manager in retired {
            manager.join().await;
        }
    }

    /// Apply one manager event atomically. Events from managers that are no
    /// longer tracked are dropped.
    pub async fn apply(&mut self, event: StreamEvent) {
        let current = self.managers.get(&event.key).map(StreamConnectionManager::session);
        if current != Some(event.session) {
            trace!(stream = %event.key, session = event.session, "dropping event from retired stream");
            return;
        }

        let mut state = self.state.write().await;
        let LiveState {
            roads,
            snapshots,
            frames,
            states,
            decode_failures,
            history,
        } = &mut *state;

        match event.payload {
            StreamPayload::State(next) => {
                let was_connected = states.values().any(ConnectionState::is_open);
                let previous = states.insert(event.key.clone(), next);
                if previous != Some(next) {
                    debug!(stream = %event.key, from = ?previous, to = ?next, "connection state changed");
                }
                let connected = states.values().any(ConnectionState::is_open);
                if connected != was_connected {
                    info!(connected, "aggregate connectivity changed");
                }
            }
            StreamPayload::Decoded(Decoded::Telemetry(snapshot)) => {
                snapshots.insert(event.key.road.clone(), Presence::Present(snapshot));
                history.sample(snapshots, roads, event.at);
            }
            StreamPayload::Decoded(Decoded::Frame(bytes)) => {
                frames.publish(event.key.road.clone(), bytes, event.at);
            }
            StreamPayload::DecodeFailed(reason) => {
                let failures = decode_failures.entry(event.key.clone()).or_default();
                *failures += 1;
                debug!(stream = %event.key, failures = *failures, %reason, "decode failure counted");
            }
        }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events_rx.recv().await
    }

    /// Full reset: drop the rolling history. Live connections are untouched.
    pub async fn reset_history(&mut self) {
        self.state.write().await.history.reset();
        info!("history reset");
    }

    /// Close every connection, wait for the tasks and release all frames.
    pub async fn stop(&mut self) {
        let managers: Vec<StreamConnectionManager> =
            self.managers.drain().map(|(_, manager)| manager).collect();
        for manager in &managers {
            manager.close();
        }
        for mut manager in managers {
            manager.join().await;
        }

        let mut state = self.state.write().await;
        for s in state.states.values_mut() {
            *s = ConnectionState::Closed;
        }
        state.frames.clear();
        info!("orchestrator stopped");
    }

    async fn run(
        mut self,
        mut desired: watch::Receiver<Vec<RoadId>>,
        mut control: mpsc::UnboundedReceiver<Control>,
        shutdown: CancellationToken,
    ) {
        let initial = desired.borrow_and_update().clone();
        self.reconcile(&initial).await;

        let mut membership_open = true;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = desired.changed(), if membership_open => {
                    if changed.is_err() {
                        warn!("membership source dropped, keeping current roads");
                        membership_open = false;
                        continue;
                    }
                    // Overlapping updates coalesce: only the latest set is read.
                    let roads = desired.borrow_and_update().clone();
                    self.reconcile(&roads).await;
                }
                Some(command) = control.recv() => match command {
                    Control::ResetHistory => self.reset_history().await,
                },
                Some(event) = self.events_rx.recv() => self.apply(event).await,
            }
        }

        self.stop().await;
    }

    /// Run on a dedicated task. The returned handle feeds membership and stops the loop.
    pub fn start(self) -> OrchestratorHandle {
        let (desired_tx, desired_rx) = watch::channel(Vec::new());
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let view = self.view();
        let task = tokio::spawn(self.run(desired_rx, control_rx, shutdown.clone()));

        OrchestratorHandle {
            desired: desired_tx,
            control: control_tx,
            view,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }
}

pub struct OrchestratorHandle {
    desired: watch::Sender<Vec<RoadId>>,
    control: mpsc::UnboundedSender<Control>,
    view: DashboardView,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OrchestratorHandle {
    pub fn set_roads(&self, roads: Vec<RoadId>) {
        self.desired.send_replace(roads);
    }

    pub fn desired_roads(&self) -> Vec<RoadId> {
        self.desired.borrow().clone()
    }

    pub fn reset_history(&self) {
        if self.control.send(Control::ResetHistory).is_err() {
            warn!("orchestrator is not running, history reset ignored");
        }
    }

    pub fn view(&self) -> DashboardView {
        self.view.clone()
    }

    pub async fn stop(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "orchestrator task ended abnormally");
            }
        }
    }
}

impl Drop for OrchestratorHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
