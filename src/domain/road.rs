// Road and stream identity domain models
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key of a monitored road, as handed out by the road directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadId(String);

impl RoadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Telemetry,
    Frame,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Telemetry, StreamKind::Frame];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Telemetry => "telemetry",
            StreamKind::Frame => "frame",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live connection: a road paired with the kind of data it carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StreamKey {
    pub road: RoadId,
    pub kind: StreamKind,
}

impl StreamKey {
    pub fn new(road: RoadId, kind: StreamKind) -> Self {
        Self { road, kind }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.road, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Dedup a requested membership list, keeping the first occurrence of each road.
pub fn dedup_roads(roads: &[RoadId]) -> Vec<RoadId> {
    let mut seen = std::collections::HashSet::new();
    roads
        .iter()
        .filter(|road| seen.insert((*road).clone()))
        .cloned()
        .collect()
}
