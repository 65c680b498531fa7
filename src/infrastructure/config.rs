use crate::application::connection_manager::ConnectionPolicy;
use crate::domain::congestion::CongestionThresholds;
use crate::domain::history::DEFAULT_HISTORY_CAPACITY;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerSettings,
    pub discovery: DiscoverySettings,
    pub streams: StreamSettings,
    pub history: HistorySettings,
    pub congestion: CongestionThresholds,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Endpoint answering `{ "road_names": [...] }`.
    pub roads_url: String,
    /// Re-query the road list every N seconds; 0 queries once at startup.
    pub refresh_secs: u64,
    pub fallback_roads: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            roads_url: "http://localhost:8000/road_names".to_string(),
            refresh_secs: 0,
            fallback_roads: ["Văn Phú", "Nguyễn Trãi", "Ngã Tư Sở", "Đường Láng", "Văn Quán"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamSettings {
    /// WebSocket URL template for telemetry; `${road}` is replaced by the encoded road name.
    pub telemetry_url: String,
    pub frame_url: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            telemetry_url: "ws://localhost:8000/ws/info/${road}".to_string(),
            frame_url: "ws://localhost:8000/ws/frames/${road}".to_string(),
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            connect_timeout_ms: 10_000,
            channel_capacity: 256,
        }
    }
}

impl StreamSettings {
    /// Zero delays and timeouts are raised to 1ms so retries never spin.
    pub fn policy(&self) -> ConnectionPolicy {
        let base_delay_ms = self.base_delay_ms.max(1);
        ConnectionPolicy {
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(base_delay_ms)),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    load_dashboard_config_from("config/dashboard")
}

/// File settings (optional) overlaid by `TRAFFIC__SECTION__KEY` environment variables.
pub fn load_dashboard_config_from(path: &str) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("TRAFFIC").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `${name}` placeholders in a template string
pub fn prepare_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_template() {
        let mut vars = HashMap::new();
        vars.insert("road".to_string(), "Van%20Phu".to_string());

        let url = prepare_template("ws://host/ws/info/${road}?v=${version}", &vars);

        assert_eq!(url, "ws://host/ws/info/Van%20Phu?v=${version}");
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_dashboard_config_from("config/does-not-exist").unwrap();

        assert_eq!(config.history.capacity, 20);
        assert_eq!(config.congestion, CongestionThresholds::default());
        assert_eq!(config.discovery.fallback_roads.len(), 5);
    }

    #[test]
    fn test_policy_cap_never_below_base() {
        let settings = StreamSettings {
            base_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..StreamSettings::default()
        };

        let policy = settings.policy();
        assert_eq!(policy.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_policy_zero_delays_are_raised() {
        let settings = StreamSettings {
            base_delay_ms: 0,
            max_delay_ms: 0,
            connect_timeout_ms: 0,
            ..StreamSettings::default()
        };

        let policy = settings.policy();
        assert_eq!(policy.base_delay, Duration::from_millis(1));
        assert_eq!(policy.max_delay, Duration::from_millis(1));
        assert_eq!(policy.connect_timeout, Duration::from_millis(1));
    }

    #[test]
    fn test_history_capacity_above_cap_is_clamped_by_buffer() {
        use crate::application::history_aggregator::HistoryAggregator;
        use crate::domain::road::RoadId;
        use crate::domain::telemetry::SnapshotMap;

        let settings = HistorySettings { capacity: 50 };
        let mut history = HistoryAggregator::new(settings.capacity);
        for _ in 0..30 {
            history.sample(&SnapshotMap::new(), &[RoadId::from("A")], chrono::Utc::now());
        }

        assert_eq!(history.len(), 20);
    }
}
