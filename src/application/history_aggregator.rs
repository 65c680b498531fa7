// History aggregator - rolling per-road samples taken on telemetry updates
use crate::domain::history::{HistoryBuffer, HistoryRecord, Metric, RoadSample};
use crate::domain::road::RoadId;
use crate::domain::telemetry::{Presence, SnapshotMap, TimeSeriesPoint};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct HistoryAggregator {
    buffer: HistoryBuffer,
}

impl HistoryAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: HistoryBuffer::with_capacity(capacity),
        }
    }

    /// Append one record holding the current value of every road in `all_roads`.
    pub fn sample(&mut self, snapshots: &SnapshotMap, all_roads: &[RoadId], at: DateTime<Utc>) {
        let roads = all_roads
            .iter()
            .map(|road| {
                let snapshot = snapshots
                    .get(road)
                    .map(Presence::as_ref)
                    .unwrap_or(Presence::Absent);
                RoadSample::from_snapshot(road.clone(), snapshot)
            })
            .collect();

        self.buffer.push(HistoryRecord::new(at, roads));
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.buffer.iter().cloned().collect()
    }

    pub fn series(&self, road: &RoadId, metric: Metric) -> Vec<TimeSeriesPoint> {
        self.buffer.series(road, metric)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
