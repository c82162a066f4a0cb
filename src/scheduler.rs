//! Chaos scheduler: decides on which ticks a crisis is forced.
//!
//! ```text
//!   STABLE ──(mode=CHAOS, new onset)──► ignition #0 ──(+5.0s)──► ignition #1
//!                                          │ now-onset > 0.5s          │
//!                                          ▼                           ▼
//!                                      steady: fire when now >= next, next = now + U(2,15)s
//! ```
//! A changed `onset` while in CHAOS resets the phase back to ignition.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::config::{ConfigStore, SimConfig};
use crate::domain::Domain;
use crate::generator::{generate, should_emit};
use crate::logging::{log_chaos_fire, log_crisis_onset, log_failure, log_generated, Category};
use crate::store::{Durability, EventLog};

pub const IGNITION_DELAY_SECS: f64 = 0.5;
pub const IGNITION_GAP_SECS: f64 = 5.0;
pub const STEADY_MIN_SECS: f64 = 2.0;
pub const STEADY_MAX_SECS: f64 = 15.0;

/// Seconds since the Unix epoch, the unit used for `onset`.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChaosPhase {
    pub events_triggered: u32,
    pub current_onset: f64,
    pub next_trigger_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDecision {
    pub is_chaos: bool,
    pub force_critical: bool,
}

#[derive(Debug, Default)]
pub struct ChaosScheduler {
    phase: ChaosPhase,
}

impl ChaosScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ChaosPhase {
        self.phase
    }

    pub fn tick<R: Rng + ?Sized>(&mut self, now: f64, cfg: &SimConfig, rng: &mut R) -> TickDecision {
        if !cfg.is_chaos() {
            return TickDecision { is_chaos: false, force_critical: false };
        }

        if cfg.onset != self.phase.current_onset {
            self.phase = ChaosPhase { events_triggered: 0, current_onset: cfg.onset, next_trigger_time: 0.0 };
            log_crisis_onset(cfg.onset);
        }

        let fire = if self.phase.events_triggered == 0 {
            now - self.phase.current_onset > IGNITION_DELAY_SECS
        } else {
            now >= self.phase.next_trigger_time
        };
        if !fire {
            return TickDecision { is_chaos: true, force_critical: false };
        }

        let gap = if self.phase.events_triggered == 0 {
            IGNITION_GAP_SECS
        } else {
            rng.gen_range(STEADY_MIN_SECS..STEADY_MAX_SECS)
        };
        self.phase.next_trigger_time = now + gap;
        self.phase.events_triggered += 1;
        log_chaos_fire(self.phase.events_triggered, gap);

        TickDecision { is_chaos: true, force_critical: true }
    }
}

/// Generate one record per domain for this tick and append the survivors.
/// Returns how many records were written.
pub fn emit_tick<R: Rng + ?Sized>(
    log: &EventLog,
    cfg: &SimConfig,
    decision: TickDecision,
    rng: &mut R,
) -> usize {
    let mut written = 0;
    for domain in Domain::ALL {
        let record = generate(domain, decision.force_critical, decision.is_chaos, &cfg.rules, rng);
        if !should_emit(decision.force_critical, rng) {
            continue;
        }
        match log.append(domain, &record, Durability::Buffered) {
            Ok(()) => {
                written += 1;
                log_generated(domain.as_str(), &record.summary(), record.is_critical());
            }
            Err(err) => log_failure(Category::Sim, "append_failed", &err),
        }
    }
    written
}

/// Scheduler loop: one tick every `tick_range_ms`, drawn uniformly.
pub async fn run(config: Arc<ConfigStore>, log: Arc<EventLog>, tick_range_ms: (u64, u64)) {
    let mut scheduler = ChaosScheduler::new();
    let mut rng = StdRng::from_entropy();
    let (lo, hi) = tick_range_ms;

    loop {
        let cfg = config.refresh();
        let decision = scheduler.tick(now_secs(), &cfg, &mut rng);
        emit_tick(&log, &cfg, decision, &mut rng);

        let pause = rng.gen_range(lo..=hi);
        sleep(Duration::from_millis(pause)).await;
    }
}
