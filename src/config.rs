//! Shared simulation config: mode, crisis onset and rule thresholds.
//!
//! The config is a single cell read by every background loop and written by
//! the control operations. Readers take an `Arc` snapshot; writers build a
//! whole new value, persist it with write-to-temp + rename, then swap the
//! snapshot. A reader therefore sees either the old or the new config, never
//! a mix of both.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use crate::error::{SimError, SimResult};
use crate::logging::{log, log_failure, obj, v_str, Category, Level};

pub const DEFAULT_MAX_BPM: u32 = 140;
pub const DEFAULT_MAX_DRAWDOWN_PCT: f64 = 10.0;
pub const DEFAULT_MAX_LATENCY_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Stable,
    Chaos,
}

/// Per-domain rule-breach thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default = "default_max_bpm")]
    pub max_bpm: u32,
    #[serde(rename = "max_drawdown", default = "default_max_drawdown")]
    pub max_drawdown_pct: f64,
    #[serde(rename = "max_latency", default = "default_max_latency")]
    pub max_latency_ms: u64,
}

fn default_max_bpm() -> u32 {
    DEFAULT_MAX_BPM
}

fn default_max_drawdown() -> f64 {
    DEFAULT_MAX_DRAWDOWN_PCT
}

fn default_max_latency() -> u64 {
    DEFAULT_MAX_LATENCY_MS
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            max_bpm: DEFAULT_MAX_BPM,
            max_drawdown_pct: DEFAULT_MAX_DRAWDOWN_PCT,
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
        }
    }
}

/// Rule-update request: `type` selects which single threshold is replaced.
/// An omitted value for the selected target resets it to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(rename = "type")]
    pub target: String,
    #[serde(default)]
    pub max_bpm: Option<u32>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub max_latency: Option<u64>,
}

impl Rules {
    pub fn apply(&mut self, update: &RuleUpdate) -> SimResult<()> {
        match update.target.trim().to_lowercase().as_str() {
            "health" | "healthcare" => self.max_bpm = update.max_bpm.unwrap_or(DEFAULT_MAX_BPM),
            "finance" => {
                self.max_drawdown_pct = update.max_drawdown.unwrap_or(DEFAULT_MAX_DRAWDOWN_PCT)
            }
            "dev" => self.max_latency_ms = update.max_latency.unwrap_or(DEFAULT_MAX_LATENCY_MS),
            _ => return Err(SimError::UnknownRuleTarget(update.target.clone())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Crisis onset, seconds since the Unix epoch.
    #[serde(default)]
    pub onset: f64,
    #[serde(default)]
    pub rules: Rules,
}

impl SimConfig {
    pub fn is_chaos(&self) -> bool {
        self.mode == Mode::Chaos
    }
}

/// Thread-safe, file-backed handle to the current [`SimConfig`].
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<SimConfig>>,
    // Serialises writers and remembers the mtime of the last file we saw.
    writer: Mutex<Option<SystemTime>>,
}

impl ConfigStore {
    /// Load from `path`. A missing or corrupt file falls back to defaults,
    /// which are then written back.
    pub fn load(path: impl Into<PathBuf>) -> SimResult<Self> {
        let path = path.into();
        let (cfg, needs_write) = match read_config(&path) {
            Ok(cfg) => (cfg, false),
            Err(SimError::Io(err)) if err.kind() == ErrorKind::NotFound => (SimConfig::default(), true),
            Err(err) => {
                log(
                    Level::Warn,
                    Category::System,
                    "config_fallback",
                    obj(&[("msg", v_str(&err.to_string())), ("path", v_str(&path.to_string_lossy()))]),
                );
                (SimConfig::default(), true)
            }
        };

        let store = Self {
            path,
            current: RwLock::new(Arc::new(cfg.clone())),
            writer: Mutex::new(None),
        };
        if needs_write {
            store.replace(cfg)?;
        } else {
            let mut seen = store.writer.lock().unwrap_or_else(|e| e.into_inner());
            *seen = modified_at(&store.path);
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<SimConfig> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the whole config.
    pub fn replace(&self, cfg: SimConfig) -> SimResult<Arc<SimConfig>> {
        let mut seen = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        self.commit(cfg, &mut seen)
    }

    /// Read-modify-write under the writer lock. Last writer wins.
    pub fn update<F>(&self, f: F) -> SimResult<Arc<SimConfig>>
    where
        F: FnOnce(&mut SimConfig) -> SimResult<()>,
    {
        let mut seen = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = (*self.snapshot()).clone();
        f(&mut next)?;
        self.commit(next, &mut seen)
    }

    /// Pick up edits made to the file by another writer.
    ///
    /// A file that fails to parse here is treated as mid-write and ignored;
    /// the current snapshot stays in place until the next refresh.
    pub fn refresh(&self) -> Arc<SimConfig> {
        let mut seen = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mtime = modified_at(&self.path);
        if mtime.is_some() && mtime != *seen {
            match read_config(&self.path) {
                Ok(cfg) => {
                    *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(cfg);
                    *seen = mtime;
                }
                Err(err) => log_failure(Category::System, "config_refresh_failed", &err),
            }
        }
        drop(seen);
        self.snapshot()
    }

    fn commit(&self, cfg: SimConfig, seen: &mut Option<SystemTime>) -> SimResult<Arc<SimConfig>> {
        write_atomic(&self.path, &cfg)?;
        *seen = modified_at(&self.path);
        let snapshot = Arc::new(cfg);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        Ok(snapshot)
    }
}

fn read_config(path: &Path) -> SimResult<SimConfig> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn write_atomic(path: &Path, cfg: &SimConfig) -> SimResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(serde_json::to_string(cfg)?.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
