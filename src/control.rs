//! Control operations: manual trigger, stabilize, ignite, rule updates.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ConfigStore, Mode, RuleUpdate, Rules};
use crate::domain::Domain;
use crate::error::SimResult;
use crate::feed::FeedMessage;
use crate::generator::{crisis, recovery};
use crate::hub::BroadcastHub;
use crate::logging::{log, obj, v_num, v_str, Category, Level};
use crate::record::Record;
use crate::scheduler::now_secs;
use crate::store::{Durability, EventLog};

/// Wire shape of a trigger result: `{status, payload}` or `{status:"error", message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerResponse {
    Success { payload: Record },
    Error { message: String },
}

#[derive(Clone)]
pub struct Control {
    config: Arc<ConfigStore>,
    log: Arc<EventLog>,
    hub: Arc<BroadcastHub>,
}

impl Control {
    pub fn new(config: Arc<ConfigStore>, log: Arc<EventLog>, hub: Arc<BroadcastHub>) -> Self {
        Self { config, log, hub }
    }

    /// Inject one catalog scenario into `domain` and broadcast it immediately.
    ///
    /// Forces STABLE so the scheduler does not pile its own crises on top.
    /// The record is tagged `is_manual` so the live tailer skips it.
    pub fn trigger<R: Rng + ?Sized>(&self, raw_domain: &str, rng: &mut R) -> SimResult<Record> {
        let domain = Domain::parse_alias(raw_domain)?;

        self.config.update(|cfg| {
            cfg.mode = Mode::Stable;
            cfg.onset = 0.0;
            Ok(())
        })?;

        let record = crisis(domain, rng).manual().tagged(domain);
        self.log.append(domain, &record, Durability::Synced)?;
        let delivered = self.hub.publish(&FeedMessage::data_update(record.clone()));

        log(
            Level::Warn,
            Category::Control,
            "manual_trigger",
            obj(&[
                ("domain", v_str(domain.as_str())),
                ("msg", v_str(&record.summary())),
                ("observers", v_num(delivered as f64)),
            ]),
        );
        Ok(record)
    }

    pub fn trigger_response<R: Rng + ?Sized>(&self, raw_domain: &str, rng: &mut R) -> TriggerResponse {
        match self.trigger(raw_domain, rng) {
            Ok(payload) => TriggerResponse::Success { payload },
            Err(err) => TriggerResponse::Error { message: err.to_string() },
        }
    }

    /// Force STABLE and append one recovery record per domain.
    pub fn stabilize(&self) -> SimResult<Vec<Record>> {
        self.config.update(|cfg| {
            cfg.mode = Mode::Stable;
            Ok(())
        })?;

        let mut injected = Vec::with_capacity(Domain::ALL.len());
        for domain in Domain::ALL {
            let record = recovery(domain);
            self.log.append(domain, &record, Durability::Synced)?;
            injected.push(record);
        }
        log(Level::Info, Category::Control, "stabilized", obj(&[("msg", v_str("stability restored"))]));
        Ok(injected)
    }

    /// Enter CHAOS with a fresh onset, restarting the scheduler's ignition.
    pub fn ignite(&self) -> SimResult<f64> {
        let onset = now_secs();
        self.config.update(|cfg| {
            cfg.mode = Mode::Chaos;
            cfg.onset = onset;
            Ok(())
        })?;
        log(Level::Warn, Category::Control, "ignite", obj(&[("onset", v_num(onset))]));
        Ok(onset)
    }

    pub fn update_rules(&self, update: &RuleUpdate) -> SimResult<Rules> {
        let cfg = self.config.update(|cfg| cfg.rules.apply(update))?;
        log(
            Level::Info,
            Category::Control,
            "rules_updated",
            obj(&[
                ("target", v_str(&update.target)),
                ("max_bpm", v_num(cfg.rules.max_bpm as f64)),
                ("max_drawdown", v_num(cfg.rules.max_drawdown_pct)),
                ("max_latency", v_num(cfg.rules.max_latency_ms as f64)),
            ]),
        );
        Ok(cfg.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn control(dir: &TempDir) -> (Control, Arc<ConfigStore>, Arc<EventLog>, Arc<BroadcastHub>) {
        let config = Arc::new(ConfigStore::load(dir.path().join("sim_config.json")).unwrap());
        let log = Arc::new(EventLog::open(dir.path().join("live_feed")).unwrap());
        let hub = Arc::new(BroadcastHub::new());
        (Control::new(config.clone(), log.clone(), hub.clone()), config, log, hub)
    }

    #[test]
    fn test_invalid_domain_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, log, hub) = control(&dir);
        ctl.ignite().unwrap();
        let before = config.snapshot();
        let mut sub = hub.subscribe();

        let err = ctl.trigger("weather", &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, SimError::InvalidDomain(_)));
        assert_eq!(config.snapshot(), before);
        assert!(sub.rx.try_recv().is_err());
        for domain in Domain::ALL {
            assert!(log.replay(domain).unwrap().is_empty());
        }

        let resp = ctl.trigger_response("weather", &mut StdRng::seed_from_u64(1));
        assert!(matches!(resp, TriggerResponse::Error { .. }));
    }

    #[test]
    fn test_trigger_forces_stable_and_broadcasts_once() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, log, hub) = control(&dir);
        ctl.ignite().unwrap();
        let mut sub = hub.subscribe();

        let record = ctl.trigger("Health", &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(record.is_manual);
        assert_eq!(record.domain, Some(Domain::Healthcare));
        assert_eq!(config.snapshot().mode, Mode::Stable);
        assert_eq!(log.last(Domain::Healthcare).unwrap().unwrap(), record);

        let msg: serde_json::Value = serde_json::from_str(&sub.rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "data_update");
        assert_eq!(msg["data"]["is_manual"], true);
        assert!(sub.rx.try_recv().is_err());
    }

    #[test]
    fn test_trigger_keeps_rules() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, _log, _hub) = control(&dir);
        ctl.update_rules(&RuleUpdate { target: "dev".into(), max_latency: Some(750), ..Default::default() })
            .unwrap();
        ctl.trigger("dev", &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(config.snapshot().rules.max_latency_ms, 750);
    }

    #[test]
    fn test_stabilize_injects_recovery_per_domain() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, log, _hub) = control(&dir);
        ctl.ignite().unwrap();
        let injected = ctl.stabilize().unwrap();
        assert_eq!(injected.len(), 3);
        assert_eq!(config.snapshot().mode, Mode::Stable);
        for domain in Domain::ALL {
            let last = log.last(domain).unwrap().unwrap();
            assert!(!last.is_critical());
            assert!(!last.is_manual);
        }
    }

    #[test]
    fn test_ignite_sets_fresh_onset() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, _log, _hub) = control(&dir);
        let onset = ctl.ignite().unwrap();
        let cfg = config.snapshot();
        assert_eq!(cfg.mode, Mode::Chaos);
        assert_eq!(cfg.onset, onset);
        assert!(onset > 0.0);
    }

    #[test]
    fn test_update_rules_unknown_target() {
        let dir = TempDir::new().unwrap();
        let (ctl, config, _log, _hub) = control(&dir);
        let err = ctl.update_rules(&RuleUpdate { target: "ops".into(), ..Default::default() }).unwrap_err();
        assert!(matches!(err, SimError::UnknownRuleTarget(_)));
        assert_eq!(config.snapshot().rules, Rules::default());
    }
}
