use std::path::PathBuf;
use std::time::Duration;

use crate::domain::Domain;

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub feed_addr: String,
    pub tick_min_ms: u64,
    pub tick_max_ms: u64,
    pub live_poll_ms: u64,
    pub agent_poll_ms: u64,
    pub watchdog_poll_ms: u64,
    pub mitigation_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            feed_addr: "0.0.0.0:8000".to_string(),
            tick_min_ms: 100,
            tick_max_ms: 800,
            live_poll_ms: 500,
            agent_poll_ms: 500,
            watchdog_poll_ms: 1000,
            mitigation_delay_ms: 3000,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            feed_addr: std::env::var("FEED_ADDR").unwrap_or(d.feed_addr),
            tick_min_ms: std::env::var("TICK_MIN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.tick_min_ms),
            tick_max_ms: std::env::var("TICK_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.tick_max_ms),
            live_poll_ms: std::env::var("LIVE_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.live_poll_ms),
            agent_poll_ms: std::env::var("AGENT_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.agent_poll_ms),
            watchdog_poll_ms: std::env::var("WATCHDOG_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.watchdog_poll_ms),
            mitigation_delay_ms: std::env::var("MITIGATION_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.mitigation_delay_ms),
        }
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    pub fn live_feed_dir(&self) -> PathBuf {
        self.data_dir.join("live_feed")
    }

    pub fn log_path(&self, domain: Domain) -> PathBuf {
        self.live_feed_dir().join(domain.file_name())
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("sim_config.json")
    }

    pub fn agent_stream_path(&self) -> PathBuf {
        self.data_dir.join("agent_stream.jsonl")
    }

    /// Tick range in milliseconds, normalised so that min <= max.
    pub fn tick_range_ms(&self) -> (u64, u64) {
        let lo = self.tick_min_ms.min(self.tick_max_ms);
        let hi = self.tick_min_ms.max(self.tick_max_ms);
        (lo, hi)
    }

    pub fn mitigation_delay(&self) -> Duration {
        Duration::from_millis(self.mitigation_delay_ms)
    }
}
