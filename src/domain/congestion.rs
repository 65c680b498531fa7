// Congestion classification with deployment-specific thresholds
use super::telemetry::{Presence, TelemetrySnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    Unknown,
    Clear,
    Busy,
    Congested,
}

/// Vehicle totals strictly above `busy_above` are busy, strictly above `congested_above` congested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CongestionThresholds {
    pub busy_above: u64,
    pub congested_above: u64,
}

impl Default for CongestionThresholds {
    fn default() -> Self {
        Self {
            busy_above: 8,
            congested_above: 15,
        }
    }
}

impl CongestionThresholds {
    pub fn classify(&self, snapshot: Presence<&TelemetrySnapshot>) -> CongestionLevel {
        let total = match snapshot {
            Presence::Present(s) => s.total(),
            Presence::Absent => return CongestionLevel::Unknown,
        };

        if total > self.congested_above {
            CongestionLevel::Congested
        } else if total > self.busy_above {
            CongestionLevel::Busy
        } else {
            CongestionLevel::Clear
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn level(thresholds: &CongestionThresholds, cars: u32, motors: u32) -> CongestionLevel {
        let snapshot = TelemetrySnapshot::new(cars, motors, 0.0, 0.0, Utc::now());
        thresholds.classify(Presence::Present(&snapshot))
    }

    #[test]
    fn test_default_thresholds_are_strict() {
        let t = CongestionThresholds::default();
        assert_eq!(level(&t, 4, 4), CongestionLevel::Clear);
        assert_eq!(level(&t, 5, 4), CongestionLevel::Busy);
        assert_eq!(level(&t, 10, 5), CongestionLevel::Busy);
        assert_eq!(level(&t, 10, 6), CongestionLevel::Congested);
    }

    #[test]
    fn test_configured_thresholds() {
        let t = CongestionThresholds {
            busy_above: 8,
            congested_above: 20,
        };
        assert_eq!(level(&t, 10, 6), CongestionLevel::Busy);
        assert_eq!(level(&t, 15, 6), CongestionLevel::Congested);
    }

    #[test]
    fn test_absent_is_unknown() {
        let t = CongestionThresholds::default();
        assert_eq!(t.classify(Presence::Absent), CongestionLevel::Unknown);
    }
}
