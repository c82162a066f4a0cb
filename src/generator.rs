//! Synthetic record generators.
//!
//! Pure functions of (domain, force_critical, is_chaos, rules, rng). Three
//! paths per domain:
//! - ambient: benign ranges, never critical
//! - rule breach: only in CHAOS, a wider draw checked against the thresholds
//! - forced critical: a named scenario from the fixed per-domain catalog

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::Rules;
use crate::domain::Domain;
use crate::record::{MarketTick, Record, Sentiment, Syslog, SyslogLevel, VitalStatus, Vitals};

pub const ANOMALY_NEWS: &str = "MARKET ANOMALY DETECTED";

/// Fraction of ambient ticks dropped before they reach the log.
pub const SUPPRESSION_RATE: f64 = 0.1;

const SYMBOLS: &[&str] = &["PATH", "GOOGL", "NVDA", "MSFT", "TSLA"];
const PATIENTS: &[&str] = &["P-101", "P-102", "P-205", "P-999"];
const SERVICES: &[&str] = &["Auth-Service", "Payment-Gateway", "Frontend-X", "DB-Shard-01"];

// =============================================================================
// Crisis catalogs
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MarketScenario {
    pub symbol: &'static str,
    pub delta: f64,
    pub news: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct VitalsScenario {
    pub patient_id: &'static str,
    pub bpm: u32,
    pub notes: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SyslogScenario {
    pub service: &'static str,
    pub message: &'static str,
}

/// Every market crisis is a halted quote: the price marker is 0.0.
pub const MARKET_CATALOG: [MarketScenario; 8] = [
    MarketScenario { symbol: "CRASH", delta: -99.99, news: "MARKET CRASH DETECTED" },
    MarketScenario { symbol: "BTC-DUMP", delta: -40.00, news: "Flash Sale on Crypto" },
    MarketScenario { symbol: "YOLO-SHORT", delta: -69.00, news: "Hedge Fund Liquidation" },
    MarketScenario { symbol: "FLASH-CRASH", delta: -35.00, news: "High Frequency Trading Loop Detected" },
    MarketScenario { symbol: "SEC-FREEZE", delta: 0.00, news: "Regulatory Trading Halt - Investigation Pending" },
    MarketScenario { symbol: "FX-COLLAPSE", delta: -15.00, news: "Currency Peg Broken - Hyperinflation Risk" },
    MarketScenario { symbol: "DARK-POOL", delta: -12.00, news: "Suspicious Dark Pool Activity Detected" },
    MarketScenario { symbol: "QUANTUM", delta: -100.00, news: "Encryption Keys Compromised by Quantum Actor" },
];

pub const VITALS_CATALOG: [VitalsScenario; 8] = [
    VitalsScenario { patient_id: "EMERGENCY", bpm: 0, notes: "CARDIAC ARREST - CODE BLUE" },
    VitalsScenario { patient_id: "ICU-04", bpm: 45, notes: "SPO2 FAILURE - HYPOXIA" },
    VitalsScenario { patient_id: "TRAUMA-1", bpm: 160, notes: "HEMORRHAGE ALERT" },
    VitalsScenario { patient_id: "NEURO", bpm: 140, notes: "Seizure Activity Detected - Status Epilepticus" },
    VitalsScenario { patient_id: "ALLERGY", bpm: 155, notes: "Anaphylaxis - Airway Compromised" },
    VitalsScenario { patient_id: "SEPSIS", bpm: 135, notes: "Septic Shock - BP Critical" },
    VitalsScenario { patient_id: "DEVICE", bpm: 30, notes: "Pacemaker Signal Loss - Lead Failure" },
    VitalsScenario { patient_id: "ROBOT", bpm: 90, notes: "Surgical Robot Latency > 500ms - Safety Stop" },
];

pub const SYSLOG_CATALOG: [SyslogScenario; 8] = [
    SyslogScenario { service: "CORE-DB", message: "DATA CORRUPTION DETECTED - SYSTEM HALT" },
    SyslogScenario { service: "WORKER-NODE-9", message: "MEMORY LEAK - OOM KILLER INVOKED" },
    SyslogScenario { service: "AUTH-GATEWAY", message: "UNAUTHORIZED ROOT ACCESS ATTEMPT" },
    SyslogScenario { service: "LOAD-BALANCER", message: "DDOS ATTACK - 1M RPS DETECTED" },
    SyslogScenario { service: "FILE-SERVER", message: "RANSOMWARE SIGNATURE FOUND - ENCRYPTING" },
    SyslogScenario { service: "GIT-WATCHDOG", message: "API KEY LEAKED IN PUBLIC REPO" },
    SyslogScenario { service: "PAYMENT-ENGINE", message: "DEADLOCK DETECTED - TRANSACTION STUCK" },
    SyslogScenario { service: "SERVERLESS-FUNC", message: "RECURSIVE LAMBDA BOMB - COST SPIKE" },
];

/// Pick one crisis scenario uniformly from the domain's catalog.
pub fn crisis<R: Rng + ?Sized>(domain: Domain, rng: &mut R) -> Record {
    match domain {
        Domain::Finance => {
            let s = MARKET_CATALOG.choose(rng).copied().unwrap_or(MARKET_CATALOG[0]);
            Record::market(MarketTick {
                symbol: s.symbol.to_string(),
                price: 0.0,
                delta: s.delta,
                news: s.news.to_string(),
                sentiment: Sentiment::Bearish,
            })
        }
        Domain::Healthcare => {
            let s = VITALS_CATALOG.choose(rng).copied().unwrap_or(VITALS_CATALOG[0]);
            Record::vitals(Vitals {
                patient_id: s.patient_id.to_string(),
                bpm: s.bpm,
                spo2: 60,
                status: VitalStatus::Critical,
                notes: s.notes.to_string(),
            })
        }
        Domain::Dev => {
            let s = SYSLOG_CATALOG.choose(rng).copied().unwrap_or(SYSLOG_CATALOG[0]);
            Record::syslog(Syslog {
                service: s.service.to_string(),
                level: SyslogLevel::Fatal,
                message: s.message.to_string(),
                action_required: true,
            })
        }
    }
}

// =============================================================================
// Generators
// =============================================================================

pub fn generate<R: Rng + ?Sized>(
    domain: Domain,
    force_critical: bool,
    is_chaos: bool,
    rules: &Rules,
    rng: &mut R,
) -> Record {
    if force_critical {
        return crisis(domain, rng);
    }
    match domain {
        Domain::Finance => generate_market(is_chaos, rules, rng),
        Domain::Healthcare => generate_vitals(is_chaos, rules, rng),
        Domain::Dev => generate_syslog(is_chaos, rules, rng),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn pick<R: Rng + ?Sized>(pool: &[&'static str], rng: &mut R) -> String {
    pool.choose(rng).copied().unwrap_or("UNKNOWN").to_string()
}

fn generate_market<R: Rng + ?Sized>(is_chaos: bool, rules: &Rules, rng: &mut R) -> Record {
    let symbol = pick(SYMBOLS, rng);
    let price = round2(rng.gen_range(100.0..1500.0));

    // Chaos widens the downside so the drawdown rule can actually trip.
    let (lo, hi) = if is_chaos { (-0.15, 0.05) } else { (-0.05, 0.05) };
    let delta = round2(price * rng.gen_range(lo..hi));

    let drawdown_pct = (delta / price).abs() * 100.0;
    let breach = is_chaos && delta < 0.0 && drawdown_pct > rules.max_drawdown_pct;

    let sentiment = if breach || delta < 0.0 {
        Sentiment::Bearish
    } else if delta > 0.0 {
        Sentiment::Bullish
    } else {
        Sentiment::Neutral
    };
    let news = if breach { ANOMALY_NEWS } else { "Regular Trading" };

    Record::market(MarketTick { symbol, price, delta, news: news.to_string(), sentiment })
}

fn generate_vitals<R: Rng + ?Sized>(is_chaos: bool, rules: &Rules, rng: &mut R) -> Record {
    let patient_id = pick(PATIENTS, rng);
    let mut vitals = Vitals {
        patient_id,
        bpm: rng.gen_range(60..=100),
        spo2: rng.gen_range(95..=100),
        status: VitalStatus::Normal,
        notes: "Vitals Stable".to_string(),
    };

    if is_chaos {
        vitals.bpm = rng.gen_range(60..=160);
        if vitals.bpm > rules.max_bpm {
            vitals.status = VitalStatus::Critical;
            vitals.notes = format!("Rule Breach: BPM {} > {}", vitals.bpm, rules.max_bpm);
            vitals.spo2 = 85;
        }
    }
    Record::vitals(vitals)
}

fn generate_syslog<R: Rng + ?Sized>(is_chaos: bool, rules: &Rules, rng: &mut R) -> Record {
    let mut log = Syslog {
        service: pick(SERVICES, rng),
        level: SyslogLevel::Info,
        message: "Health Check OK".to_string(),
        action_required: false,
    };

    if is_chaos {
        let latency: u64 = rng.gen_range(10..=3000);
        if latency > rules.max_latency_ms {
            log.level = SyslogLevel::Error;
            log.message = format!("SLA Breach: {}ms", latency);
            log.action_required = true;
        }
    }
    Record::syslog(log)
}

/// Forced-critical ticks always land; ambient ticks are thinned out.
pub fn should_emit<R: Rng + ?Sized>(force_critical: bool, rng: &mut R) -> bool {
    force_critical || rng.gen::<f64>() >= SUPPRESSION_RATE
}

/// Benign record injected per domain by the stabilize operation.
pub fn recovery(domain: Domain) -> Record {
    match domain {
        Domain::Finance => Record::market(MarketTick {
            symbol: "RECOVERY".to_string(),
            price: 1000.0,
            delta: 5.0,
            news: "Market Stabilized".to_string(),
            sentiment: Sentiment::Bullish,
        }),
        Domain::Healthcare => Record::vitals(Vitals {
            patient_id: "SYSTEM".to_string(),
            bpm: 72,
            spo2: 99,
            status: VitalStatus::Normal,
            notes: "All Systems Normal".to_string(),
        }),
        Domain::Dev => Record::syslog(Syslog {
            service: "SYSTEM".to_string(),
            level: SyslogLevel::Info,
            message: "Manual Override: Stability Restored".to_string(),
            action_required: false,
        }),
    }
}
