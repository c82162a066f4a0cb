//! Structured logging for the telemetry simulator.
//!
//! Every entry is one JSON object per line:
//! 1. Multi-level granularity (TRACE → FATAL), filtered by `LOG_LEVEL`
//! 2. Categories for filtering (`LOG_CATEGORIES`), one per background loop
//! 3. Per-run directory with `events.jsonl` and `trace.jsonl`
//! 4. Monotonic sequence numbers so interleaved loops can be re-ordered

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sim,     // Generated records, suppression
    Chaos,   // Scheduler phase changes and fires
    Feed,    // Tailers, hub, websocket observers
    Remedy,  // Watchdog classification and mitigations
    Control, // Trigger / stabilize / rule updates
    System,  // Startup, shutdown, config persistence
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sim => "sim",
            Category::Chaos => "chaos",
            Category::Feed => "feed",
            Category::Remedy => "remedy",
            Category::Control => "control",
            Category::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_CATEGORIES").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(list) => list.split(',').any(|c| c.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(file) => Some(Mutex::new(BufWriter::new(file))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, category: Category, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !category.is_enabled() {
        return;
    }
    emit_record(level, category.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    if let Some(domain) = fields.remove("domain") {
        entry.insert("domain".to_string(), domain);
    }
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

// =============================================================================
// Simulation helpers
// =============================================================================

pub fn log_crisis_onset(onset: f64) {
    log(
        Level::Warn,
        Category::Chaos,
        "crisis_onset",
        obj(&[("msg", v_str("new crisis onset detected")), ("onset", v_num(onset))]),
    );
}

pub fn log_chaos_fire(events_triggered: u32, next_trigger_in: f64) {
    log(
        Level::Warn,
        Category::Chaos,
        "chaos_fire",
        obj(&[
            ("events_triggered", json!(events_triggered)),
            ("next_trigger_in_secs", v_num(next_trigger_in)),
        ]),
    );
}

pub fn log_generated(domain: &str, summary: &str, critical: bool) {
    log(
        if critical { Level::Warn } else { Level::Debug },
        Category::Sim,
        "record_generated",
        obj(&[
            ("domain", v_str(domain)),
            ("msg", v_str(summary)),
            ("critical", Value::Bool(critical)),
        ]),
    );
}

pub fn log_mitigation(event: &str, domain: &str, subject: &str, action: &str) {
    log(
        Level::Info,
        Category::Remedy,
        event,
        obj(&[
            ("domain", v_str(domain)),
            ("subject", v_str(subject)),
            ("action", v_str(action)),
        ]),
    );
}

pub fn log_failure(category: Category, event: &str, err: &dyn std::fmt::Display) {
    log(
        Level::Error,
        category,
        event,
        obj(&[("msg", v_str(&err.to_string()))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
