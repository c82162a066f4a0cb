//! Event records written to the per-domain logs.
//!
//! On disk every record is one flat JSON object:
//! `{"timestamp": .., "type": "market_tick" | "vitals" | "syslog", ..variant fields..}`
//! plus the optional `is_manual` and `domain` tags.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::logging::ts_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VitalStatus {
    Normal,
    Critical,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyslogLevel {
    Info,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub symbol: String,
    pub price: f64,
    pub delta: f64,
    pub news: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub patient_id: String,
    pub bpm: u32,
    pub spo2: u32,
    pub status: VitalStatus,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syslog {
    pub service: String,
    pub level: SyslogLevel,
    pub message: String,
    pub action_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Body {
    #[serde(rename = "market_tick")]
    Market(MarketTick),
    #[serde(rename = "vitals")]
    Vitals(Vitals),
    #[serde(rename = "syslog")]
    Syslog(Syslog),
}

impl Body {
    /// The domain whose log this body belongs in.
    pub fn domain(&self) -> Domain {
        match self {
            Body::Market(_) => Domain::Finance,
            Body::Vitals(_) => Domain::Healthcare,
            Body::Syslog(_) => Domain::Dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: String,
    #[serde(flatten)]
    pub body: Body,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

impl Record {
    /// Stamp a body with the current generation time.
    pub fn now(body: Body) -> Self {
        Self { timestamp: ts_now(), body, is_manual: false, domain: None }
    }

    pub fn market(tick: MarketTick) -> Self {
        Self::now(Body::Market(tick))
    }

    pub fn vitals(vitals: Vitals) -> Self {
        Self::now(Body::Vitals(vitals))
    }

    pub fn syslog(log: Syslog) -> Self {
        Self::now(Body::Syslog(log))
    }

    pub fn manual(mut self) -> Self {
        self.is_manual = true;
        self
    }

    pub fn tagged(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn kind_domain(&self) -> Domain {
        self.body.domain()
    }

    /// Whether this record carries a crisis marker.
    pub fn is_critical(&self) -> bool {
        match &self.body {
            Body::Market(t) => t.price == 0.0 || t.news == crate::generator::ANOMALY_NEWS,
            Body::Vitals(v) => v.status == VitalStatus::Critical,
            Body::Syslog(s) => matches!(s.level, SyslogLevel::Error | SyslogLevel::Fatal),
        }
    }

    /// One-line human summary, used by the generation echo.
    pub fn summary(&self) -> String {
        match &self.body {
            Body::Market(t) => format!("[FINANCE] {} ${:.2} ({:+.2})", t.symbol, t.price, t.delta),
            Body::Vitals(v) => format!("[HEALTH] {} BPM:{} SpO2:{} {:?}", v.patient_id, v.bpm, v.spo2, v.status),
            Body::Syslog(s) => format!("[DEV] {} {:?} {}", s.service, s.level, s.message),
        }
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_market_tick_wire_shape() {
        let rec = Record {
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            body: Body::Market(MarketTick {
                symbol: "NVDA".to_string(),
                price: 812.5,
                delta: -1.25,
                news: "Regular Trading".to_string(),
                sentiment: Sentiment::Bearish,
            }),
            is_manual: false,
            domain: None,
        };
        let v: Value = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            v,
            json!({
                "timestamp": "2024-01-01T00:00:00.000Z",
                "type": "market_tick",
                "symbol": "NVDA",
                "price": 812.5,
                "delta": -1.25,
                "news": "Regular Trading",
                "sentiment": "bearish"
            })
        );
    }

    #[test]
    fn test_manual_and_domain_tags_serialised() {
        let rec = Record::syslog(Syslog {
            service: "CORE-DB".to_string(),
            level: SyslogLevel::Fatal,
            message: "DATA CORRUPTION DETECTED - SYSTEM HALT".to_string(),
            action_required: true,
        })
        .manual()
        .tagged(Domain::Dev);
        let v: Value = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["type"], "syslog");
        assert_eq!(v["level"], "FATAL");
        assert_eq!(v["is_manual"], true);
        assert_eq!(v["domain"], "dev");
    }

    #[test]
    fn test_parses_integer_price() {
        let line = r#"{"timestamp":"t","type":"market_tick","symbol":"CRASH","price":0,"delta":-99.99,"news":"x","sentiment":"bearish"}"#;
        let rec = Record::from_line(line).unwrap();
        match rec.body {
            Body::Market(t) => assert_eq!(t.price, 0.0),
            other => panic!("unexpected body {:?}", other),
        }
        assert!(!rec.is_manual);
        assert!(rec.domain.is_none());
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Record::from_line(r#"{"timestamp":"t","type":"weather"}"#).is_err());
        assert!(Record::from_line("not json").is_err());
    }

    #[test]
    fn test_body_domain_mapping() {
        let v = Record::vitals(Vitals {
            patient_id: "P-101".to_string(),
            bpm: 72,
            spo2: 98,
            status: VitalStatus::Normal,
            notes: "Vitals Stable".to_string(),
        });
        assert_eq!(v.kind_domain(), Domain::Healthcare);
        assert!(!v.is_critical());
    }
}
