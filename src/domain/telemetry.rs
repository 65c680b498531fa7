// Telemetry data domain models
use super::road::RoadId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Telemetry per tracked road. Untracked roads have no key at all.
pub type SnapshotMap = HashMap<RoadId, Presence<TelemetrySnapshot>>;

/// Explicit "tracked but nothing decoded yet" state for per-road data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Presence<T> {
    Present(T),
    Absent,
}

impl<T> Presence<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present(_))
    }

    pub fn as_ref(&self) -> Presence<&T> {
        match self {
            Presence::Present(value) => Presence::Present(value),
            Presence::Absent => Presence::Absent,
        }
    }

    pub fn present(self) -> Option<T> {
        match self {
            Presence::Present(value) => Some(value),
            Presence::Absent => None,
        }
    }
}

impl<T> Default for Presence<T> {
    fn default() -> Self {
        Presence::Absent
    }
}

impl<T> From<Option<T>> for Presence<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Presence::Present(value),
            None => Presence::Absent,
        }
    }
}

/// Latest successfully decoded telemetry for one road.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub count_car: u32,
    pub count_motor: u32,
    pub speed_car: f64,
    pub speed_motor: f64,
    pub received_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    pub fn new(
        count_car: u32,
        count_motor: u32,
        speed_car: f64,
        speed_motor: f64,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            count_car,
            count_motor,
            speed_car,
            speed_motor,
            received_at,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.count_car) + u64::from(self.count_motor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}
