//! Process wiring: bootstrap the data directory, then run the scheduler,
//! watchdog, both tailers, and the feed server side by side.

use anyhow::{Context, Result};
use std::fs::{create_dir_all, OpenOptions};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::config::{ConfigStore, Mode};
use crate::control::Control;
use crate::deferred::DeferredQueue;
use crate::feed;
use crate::hub::BroadcastHub;
use crate::logging::{log, obj, v_num, v_str, Category, Level};
use crate::remedy::Watchdog;
use crate::scheduler;
use crate::settings::Settings;
use crate::store::EventLog;

pub struct App {
    pub settings: Settings,
    pub config: Arc<ConfigStore>,
    pub log: Arc<EventLog>,
    pub hub: Arc<BroadcastHub>,
    pub queue: DeferredQueue,
    pub control: Control,
}

impl App {
    /// Start every session from empty domain logs in STABLE mode. Rules
    /// survive restarts; history and chaos state do not.
    pub fn bootstrap(settings: Settings) -> Result<Self> {
        create_dir_all(&settings.data_dir)
            .with_context(|| format!("create {}", settings.data_dir.display()))?;

        let event_log = Arc::new(EventLog::open(settings.live_feed_dir())?);
        event_log.truncate_all()?;

        let config = Arc::new(ConfigStore::load(settings.config_path())?);
        let cfg = config.update(|cfg| {
            cfg.mode = Mode::Stable;
            cfg.onset = 0.0;
            Ok(())
        })?;

        let agent_path = settings.agent_stream_path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&agent_path)
            .with_context(|| format!("create {}", agent_path.display()))?;

        let hub = Arc::new(BroadcastHub::new());
        let control = Control::new(config.clone(), event_log.clone(), hub.clone());

        log(
            Level::Info,
            Category::System,
            "bootstrap",
            obj(&[
                ("data_dir", v_str(&settings.data_dir.to_string_lossy())),
                ("max_bpm", v_num(cfg.rules.max_bpm as f64)),
                ("max_drawdown", v_num(cfg.rules.max_drawdown_pct)),
                ("max_latency", v_num(cfg.rules.max_latency_ms as f64)),
            ]),
        );

        Ok(Self { settings, config, log: event_log, hub, queue: DeferredQueue::new(), control })
    }

    /// Spawn the background loops. Must be called from within a tokio runtime.
    pub fn spawn_loops(&self) -> Vec<JoinHandle<()>> {
        let s = &self.settings;
        let watchdog = Watchdog::new(self.log.clone(), self.queue.clone(), s.mitigation_delay());

        vec![
            tokio::spawn(scheduler::run(self.config.clone(), self.log.clone(), s.tick_range_ms())),
            tokio::spawn(watchdog.run(Duration::from_millis(s.watchdog_poll_ms))),
            tokio::spawn(feed::run_live(
                self.log.clone(),
                self.hub.clone(),
                Duration::from_millis(s.live_poll_ms),
            )),
            tokio::spawn(feed::run_agent(
                s.agent_stream_path(),
                self.hub.clone(),
                Duration::from_millis(s.agent_poll_ms),
            )),
        ]
    }

    pub async fn serve(&self) -> Result<()> {
        feed::serve(&self.settings.feed_addr, self.hub.clone(), self.control.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleUpdate, SimConfig};
    use crate::domain::Domain;
    use crate::generator::recovery;
    use crate::store::Durability;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_resets_logs_and_mode_but_keeps_rules() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_data_dir(dir.path());

        {
            let app = App::bootstrap(settings.clone()).unwrap();
            app.log.append(Domain::Finance, &recovery(Domain::Finance), Durability::Synced).unwrap();
            app.control
                .update_rules(&RuleUpdate { target: "health".into(), max_bpm: Some(110), ..Default::default() })
                .unwrap();
            app.control.ignite().unwrap();
        }

        let app = App::bootstrap(settings.clone()).unwrap();
        let cfg: SimConfig = (*app.config.snapshot()).clone();
        assert_eq!(cfg.mode, Mode::Stable);
        assert_eq!(cfg.onset, 0.0);
        assert_eq!(cfg.rules.max_bpm, 110);
        for domain in Domain::ALL {
            assert!(app.log.replay(domain).unwrap().is_empty());
        }
        assert!(settings.agent_stream_path().exists());
    }
}
