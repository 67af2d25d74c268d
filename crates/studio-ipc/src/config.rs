//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest accepted interval between active-participant polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for the studio client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// API host serving REST and the base streaming channels.
    pub api_host: String,

    /// `Origin` header sent on websocket handshakes.
    pub origin: String,

    /// Domain under which each session exposes its meters channel.
    pub meters_domain: String,

    /// Server status value that means the studio is ready.
    pub ready_status: String,

    /// Meter client names that never belong to a participant.
    pub ignored_meter_devices: Vec<String>,

    /// Interval between active-participant polls in milliseconds. Values
    /// below [`MIN_POLL_INTERVAL`] are raised to it.
    pub poll_interval_ms: u64,

    /// REST request timeout in milliseconds.
    pub http_timeout_ms: u64,

    /// Observer backlog beyond which meter updates are skipped.
    pub event_channel_capacity: usize,

    /// Reconnect behaviour of streaming channels.
    pub reconnect: ReconnectConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_host: "app.jacktrip.org".to_string(),
            origin: "https://app.jacktrip.org".to_string(),
            meters_domain: "jacktrip.cloud".to_string(),
            ready_status: "Ready".to_string(),
            ignored_meter_devices: vec!["Jamulus".to_string(), "supernova".to_string()],
            poll_interval_ms: 3000,
            http_timeout_ms: 10_000,
            event_channel_capacity: 1024,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Base URL for REST calls.
    pub fn api_base_url(&self) -> String {
        format!("https://{}", self.api_host)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Reconnect parameters (see `ReconnectPolicy` in the transport crate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,

    /// Delay of the second attempt; doubles afterwards.
    pub base_delay_ms: u64,

    /// Upper bound on a single delay.
    pub max_delay_ms: u64,

    /// Fraction of the delay added as random jitter (0.0 - 1.0).
    pub jitter: f64,

    /// A connection open at least this long resets the attempt counter.
    pub stable_after_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
            stable_after_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StudioConfig = toml::from_str(
            r#"
            api_host = "staging.example.org"

            [reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url(), "https://staging.example.org");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay_ms, 500);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.ignored_meter_devices.len(), 2);
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let config = StudioConfig {
            poll_interval_ms: 0,
            ..StudioConfig::default()
        };
        assert_eq!(config.poll_interval(), MIN_POLL_INTERVAL);

        let config = StudioConfig {
            poll_interval_ms: 1500,
            ..StudioConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1500));
    }
}
