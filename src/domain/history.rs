// Rolling history domain models
use super::road::RoadId;
use super::telemetry::{Presence, TelemetrySnapshot, TimeSeriesPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cars,
    Motors,
    CarSpeed,
    MotorSpeed,
    Total,
}

impl Metric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cars" => Some(Metric::Cars),
            "motors" => Some(Metric::Motors),
            "car_speed" => Some(Metric::CarSpeed),
            "motor_speed" => Some(Metric::MotorSpeed),
            "total" => Some(Metric::Total),
            _ => None,
        }
    }
}

/// One road's values inside a history record. Roads without data sample as zeros.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadSample {
    pub road: RoadId,
    pub cars: u32,
    pub motors: u32,
    pub car_speed: f64,
    pub motor_speed: f64,
    pub total: u64,
}

impl RoadSample {
    pub fn from_snapshot(road: RoadId, snapshot: Presence<&TelemetrySnapshot>) -> Self {
        match snapshot {
            Presence::Present(s) => Self {
                road,
                cars: s.count_car,
                motors: s.count_motor,
                car_speed: s.speed_car,
                motor_speed: s.speed_motor,
                total: s.total(),
            },
            Presence::Absent => Self {
                road,
                cars: 0,
                motors: 0,
                car_speed: 0.0,
                motor_speed: 0.0,
                total: 0,
            },
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cars => f64::from(self.cars),
            Metric::Motors => f64::from(self.motors),
            Metric::CarSpeed => self.car_speed,
            Metric::MotorSpeed => self.motor_speed,
            Metric::Total => self.total as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub taken_at: DateTime<Utc>,
    pub roads: Vec<RoadSample>,
}

impl HistoryRecord {
    pub fn new(taken_at: DateTime<Utc>, roads: Vec<RoadSample>) -> Self {
        Self { taken_at, roads }
    }

    /// Axis label, e.g. "14:05:09".
    pub fn label(&self) -> String {
        self.taken_at.format("%H:%M:%S").to_string()
    }

    pub fn road(&self, road: &RoadId) -> Option<&RoadSample> {
        self.roads.iter().find(|sample| &sample.road == road)
    }
}

/// Bounded FIFO of history records; the oldest record is evicted on overflow.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Capacity is clamped to `1..=DEFAULT_HISTORY_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, DEFAULT_HISTORY_CAPACITY);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: HistoryRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Per-road series for one metric. Records that predate the road's membership are skipped.
    pub fn series(&self, road: &RoadId, metric: Metric) -> Vec<TimeSeriesPoint> {
        self.records
            .iter()
            .filter_map(|record| {
                record.road(road).map(|sample| {
                    TimeSeriesPoint::new(record.taken_at.timestamp_millis(), sample.value(metric))
                })
            })
            .collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(seq: u32) -> HistoryRecord {
        let at = Utc.timestamp_opt(1_700_000_000 + i64::from(seq), 0).unwrap();
        let snapshot = TelemetrySnapshot::new(seq, 0, 0.0, 0.0, at);
        HistoryRecord::new(
            at,
            vec![RoadSample::from_snapshot(RoadId::from("A"), Presence::Present(&snapshot))],
        )
    }

    #[test]
    fn test_buffer_keeps_latest_twenty() {
        let mut buffer = HistoryBuffer::default();
        for seq in 1..=21 {
            buffer.push(record(seq));
            assert!(buffer.len() <= DEFAULT_HISTORY_CAPACITY);
        }

        let cars: Vec<u32> = buffer.iter().map(|r| r.roads[0].cars).collect();
        assert_eq!(cars, (2..=21).collect::<Vec<_>>());
    }

    #[test]
    fn test_oversized_capacity_still_holds_twenty() {
        let mut buffer = HistoryBuffer::with_capacity(50);
        assert_eq!(buffer.capacity(), DEFAULT_HISTORY_CAPACITY);

        for seq in 1..=30 {
            buffer.push(record(seq));
        }

        assert_eq!(buffer.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(buffer.iter().next().map(|r| r.roads[0].cars), Some(11));
        assert_eq!(HistoryBuffer::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_absent_road_samples_as_zero() {
        let sample = RoadSample::from_snapshot(RoadId::from("B"), Presence::Absent);
        assert_eq!(sample.total, 0);
        assert_eq!(sample.value(Metric::CarSpeed), 0.0);
    }

    #[test]
    fn test_series_skips_records_without_road() {
        let mut buffer = HistoryBuffer::with_capacity(5);
        buffer.push(record(1));
        buffer.push(HistoryRecord::new(Utc::now(), vec![]));
        buffer.push(record(3));

        let series = buffer.series(&RoadId::from("A"), Metric::Cars);
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_label_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap();
        assert_eq!(HistoryRecord::new(at, vec![]).label(), "14:05:09");
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(Metric::parse("car_speed"), Some(Metric::CarSpeed));
        assert_eq!(Metric::parse("speed"), None);
    }
}
