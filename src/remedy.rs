//! Remediation watchdog.
//!
//! Tails every domain log from its current end, classifies each new record,
//! and for crisis records schedules a corrective record after a fixed
//! analysis delay. The corrective action is picked from an ordered
//! pattern → action table, first match wins, with a fallback.

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::domain::Domain;
use crate::deferred::DeferredQueue;
use crate::logging::log_mitigation;
use crate::record::{Body, MarketTick, Record, Sentiment, Syslog, SyslogLevel, VitalStatus, Vitals};
use crate::store::{Durability, EventLog};
use crate::tailer::DomainTailer;

pub const REMEDIATION_PREFIX: &str = "AUTO-REMEDIATION";

// =============================================================================
// Action tables
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ActionRule {
    pub pattern: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ActionTable {
    pub rules: &'static [ActionRule],
    pub fallback: &'static str,
}

impl ActionTable {
    /// First rule whose pattern occurs in `text` (case-insensitive).
    pub fn select(&self, text: &str) -> &'static str {
        let haystack = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| haystack.contains(&rule.pattern.to_lowercase()))
            .map(|rule| rule.action)
            .unwrap_or(self.fallback)
    }
}

pub const DEV_ACTIONS: ActionTable = ActionTable {
    rules: &[
        ActionRule { pattern: "memory leak", action: "Garbage Collection triggered - heap reclaimed, pod recycled" },
        ActionRule { pattern: "corruption", action: "Replica promoted - corrupted shard quarantined" },
        ActionRule { pattern: "root access", action: "Credentials rotated - offending session terminated" },
        ActionRule { pattern: "ddos", action: "Rate limiting enabled - traffic scrubbed at edge" },
        ActionRule { pattern: "ransomware", action: "Host isolated - restoring from clean snapshot" },
        ActionRule { pattern: "api key", action: "API key revoked and reissued" },
        ActionRule { pattern: "deadlock", action: "Deadlock broken - stuck transactions rolled back" },
        ActionRule { pattern: "lambda", action: "Concurrency cap applied - runaway functions throttled" },
        ActionRule { pattern: "outage", action: "Failover to standby region completed" },
    ],
    fallback: "Service restarted - automated rollback applied",
};

pub const HEALTH_ACTIONS: ActionTable = ActionTable {
    rules: &[
        ActionRule { pattern: "cardiac", action: "Defibrillator discharged - sinus rhythm restored" },
        ActionRule { pattern: "hypoxia", action: "Supplemental oxygen increased - saturation recovering" },
        ActionRule { pattern: "hemorrhage", action: "Massive transfusion protocol activated" },
        ActionRule { pattern: "seizure", action: "Anticonvulsant administered - activity subsiding" },
        ActionRule { pattern: "anaphylaxis", action: "Epinephrine administered - airway secured" },
        ActionRule { pattern: "septic", action: "Broad-spectrum antibiotics and fluids started" },
        ActionRule { pattern: "pacemaker", action: "Backup transcutaneous pacing engaged" },
        ActionRule { pattern: "robot", action: "Manual surgical control restored" },
        ActionRule { pattern: "rule breach", action: "Rate control medication administered" },
    ],
    fallback: "Rapid response team dispatched",
};

pub const MARKET_ACTION: &str = "Circuit breaker engaged - trading halted, liquidity restored";

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Mitigation {
    Dev { service: String, message: String },
    Health { patient_id: String, notes: String },
    Market,
}

impl Mitigation {
    pub fn domain(&self) -> Domain {
        match self {
            Mitigation::Dev { .. } => Domain::Dev,
            Mitigation::Health { .. } => Domain::Healthcare,
            Mitigation::Market => Domain::Finance,
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Mitigation::Dev { service, .. } => service,
            Mitigation::Health { patient_id, .. } => patient_id,
            Mitigation::Market => "MARKET",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Mitigation::Dev { message, .. } => DEV_ACTIONS.select(message),
            Mitigation::Health { notes, .. } => HEALTH_ACTIONS.select(notes),
            Mitigation::Market => MARKET_ACTION,
        }
    }

    /// The INFO/STABLE record appended once the analysis delay is over.
    pub fn corrective_record(&self) -> Record {
        let text = format!("{}: {}", REMEDIATION_PREFIX, self.action());
        match self {
            Mitigation::Dev { service, .. } => Record::syslog(Syslog {
                service: service.clone(),
                level: SyslogLevel::Info,
                message: text,
                action_required: false,
            }),
            Mitigation::Health { patient_id, .. } => Record::vitals(Vitals {
                patient_id: patient_id.clone(),
                bpm: 72,
                spo2: 98,
                status: VitalStatus::Stable,
                notes: text,
            }),
            Mitigation::Market => Record::market(MarketTick {
                symbol: "CIRCUIT-BREAKER".to_string(),
                price: 1000.0,
                delta: 0.0,
                news: text,
                sentiment: Sentiment::Neutral,
            }),
        }
    }
}

/// Decide whether a record read from `domain`'s log needs a mitigation.
pub fn classify(domain: Domain, record: &Record) -> Option<Mitigation> {
    match (domain, &record.body) {
        (Domain::Dev, Body::Syslog(s)) if s.level == SyslogLevel::Fatal => Some(Mitigation::Dev {
            service: s.service.clone(),
            message: s.message.clone(),
        }),
        (Domain::Healthcare, Body::Vitals(v)) if v.status == VitalStatus::Critical => {
            Some(Mitigation::Health { patient_id: v.patient_id.clone(), notes: v.notes.clone() })
        }
        (Domain::Finance, Body::Market(t)) if t.price == 0.0 => Some(Mitigation::Market),
        _ => None,
    }
}

// =============================================================================
// Watchdog
// =============================================================================

pub struct Watchdog {
    tailer: DomainTailer,
    log: Arc<EventLog>,
    queue: DeferredQueue,
    delay: Duration,
}

impl Watchdog {
    /// Starts at the current end of every log; history is not re-mitigated.
    pub fn new(log: Arc<EventLog>, queue: DeferredQueue, delay: Duration) -> Self {
        Self { tailer: DomainTailer::from_end(&log), log, queue, delay }
    }

    /// Poll once and schedule a mitigation for each crisis record.
    /// Returns how many mitigations were scheduled.
    pub fn scan(&mut self) -> usize {
        let mut scheduled = 0;
        for record in self.tailer.poll_all() {
            let domain = record.domain.unwrap_or_else(|| record.kind_domain());
            if let Some(mitigation) = classify(domain, &record) {
                self.schedule(mitigation);
                scheduled += 1;
            }
        }
        scheduled
    }

    fn schedule(&self, mitigation: Mitigation) {
        log_mitigation("mitigation_scheduled", mitigation.domain().as_str(), mitigation.subject(), mitigation.action());
        let log = self.log.clone();
        self.queue.schedule(self.delay, move || {
            let record = mitigation.corrective_record();
            log.append(mitigation.domain(), &record, Durability::Synced)?;
            log_mitigation("mitigation_applied", mitigation.domain().as_str(), mitigation.subject(), mitigation.action());
            Ok(())
        });
    }

    pub async fn run(mut self, poll_every: Duration) {
        loop {
            self.scan();
            sleep(poll_every).await;
        }
    }
}
