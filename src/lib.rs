//! Telemetry chaos simulator.
//!
//! Three synthetic domains (finance, healthcare, dev) each write an
//! append-only JSON-lines log. A chaos scheduler decides when to inject
//! crisis records, a watchdog schedules corrective records, and a
//! websocket feed fans every new record out to observers.

pub mod app;
pub mod config;
pub mod control;
pub mod deferred;
pub mod domain;
pub mod error;
pub mod feed;
pub mod generator;
pub mod hub;
pub mod logging;
pub mod record;
pub mod remedy;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod tailer;
