//! Live update feed.
//!
//! Two tailers push into the [`BroadcastHub`]: the live-data tailer (all
//! domain logs, from offset 0, manual records skipped because the trigger
//! path already broadcast them) and the agent-output tailer (fast-forwarded).
//! Observers connect over a websocket and may send free text or JSON control
//! frames back.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::Message;

use crate::config::RuleUpdate;
use crate::control::Control;
use crate::hub::BroadcastHub;
use crate::logging::{log, log_failure, obj, v_str, Category, Level};
use crate::record::Record;
use crate::store::EventLog;
use crate::tailer::{DomainTailer, LogTailer};

pub const ANALYZE_ACK: &str =
    "Analyzing latest stream... Detected 3 anomalies in the last minute. Engaging protection protocols.";
pub const AGENT_PLACEHOLDER: &str = "Processing...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    DataUpdate {
        data: Record,
    },
    AgentResponse {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    ControlResult {
        result: Value,
    },
}

impl FeedMessage {
    pub fn data_update(record: Record) -> Self {
        FeedMessage::DataUpdate { data: record }
    }

    pub fn analyze_ack() -> Self {
        FeedMessage::AgentResponse { content: ANALYZE_ACK.to_string(), raw: None }
    }

    /// Wrap one line of the external scorer's output.
    pub fn from_agent_output(raw: Value) -> Self {
        let content = raw
            .get("ai_response")
            .and_then(|v| v.as_str())
            .unwrap_or(AGENT_PLACEHOLDER)
            .to_string();
        FeedMessage::AgentResponse { content, raw: Some(raw) }
    }
}

// =============================================================================
// Tailer pumps
// =============================================================================

/// Broadcast every new non-manual record. Returns how many were published.
pub fn pump_live(tailer: &mut DomainTailer, hub: &BroadcastHub) -> usize {
    let mut published = 0;
    for record in tailer.poll_all() {
        if record.is_manual {
            continue;
        }
        hub.publish(&FeedMessage::data_update(record));
        published += 1;
    }
    published
}

pub fn pump_agent(tailer: &mut LogTailer, hub: &BroadcastHub) -> usize {
    match tailer.poll::<Value>() {
        Ok(items) => {
            let n = items.len();
            for raw in items {
                hub.publish(&FeedMessage::from_agent_output(raw));
            }
            n
        }
        Err(err) => {
            log_failure(Category::Feed, "agent_tail_failed", &err);
            0
        }
    }
}

pub async fn run_live(log: Arc<EventLog>, hub: Arc<BroadcastHub>, poll_every: Duration) {
    let mut tailer = DomainTailer::from_start(&log);
    loop {
        pump_live(&mut tailer, &hub);
        sleep(poll_every).await;
    }
}

pub async fn run_agent(path: PathBuf, hub: Arc<BroadcastHub>, poll_every: Duration) {
    let mut tailer = LogTailer::from_end(path);
    loop {
        pump_agent(&mut tailer, &hub);
        sleep(poll_every).await;
    }
}

// =============================================================================
// Client frames
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Trigger { domain: String },
    Stabilize,
    Ignite,
    UpdateRules(RuleUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Control(ControlRequest),
    Analyze,
    Ignore,
}

pub fn interpret(text: &str) -> ClientCommand {
    if let Ok(req) = serde_json::from_str::<ControlRequest>(text) {
        return ClientCommand::Control(req);
    }
    if text.to_lowercase().contains("analyze") {
        return ClientCommand::Analyze;
    }
    ClientCommand::Ignore
}

fn error_result(err: impl std::fmt::Display) -> Value {
    json!({ "status": "error", "message": err.to_string() })
}

pub fn execute(control: &Control, request: ControlRequest) -> Value {
    match request {
        ControlRequest::Trigger { domain } => {
            let resp = control.trigger_response(&domain, &mut rand::thread_rng());
            serde_json::to_value(resp).unwrap_or_else(error_result)
        }
        ControlRequest::Stabilize => match control.stabilize() {
            Ok(_) => json!({ "status": "stabilized" }),
            Err(err) => error_result(err),
        },
        ControlRequest::Ignite => match control.ignite() {
            Ok(onset) => json!({ "status": "chaos", "onset": onset }),
            Err(err) => error_result(err),
        },
        ControlRequest::UpdateRules(update) => match control.update_rules(&update) {
            Ok(rules) => json!({ "status": "updated", "config": rules }),
            Err(err) => error_result(err),
        },
    }
}

// =============================================================================
// Websocket server
// =============================================================================

pub async fn serve(addr: &str, hub: Arc<BroadcastHub>, control: Control) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log(Level::Info, Category::Feed, "listening", obj(&[("addr", v_str(addr))]));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                log_failure(Category::Feed, "accept_failed", &err);
                continue;
            }
        };
        let hub = hub.clone();
        let control = control.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_observer(stream, hub, control).await {
                log(
                    Level::Debug,
                    Category::Feed,
                    "observer_closed",
                    obj(&[("peer", v_str(&peer.to_string())), ("msg", v_str(&err.to_string()))]),
                );
            }
        });
    }
}

async fn handle_observer(stream: TcpStream, hub: Arc<BroadcastHub>, control: Control) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();
    let mut sub = hub.subscribe();
    let id = sub.id;
    log(Level::Info, Category::Feed, "observer_connected", obj(&[("observer", id.into())]));

    let outcome: Result<()> = async {
        loop {
            tokio::select! {
                outgoing = sub.rx.recv() => match outgoing {
                    Some(text) => write.send(Message::Text(text)).await?,
                    None => break,
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match interpret(&text) {
                        ClientCommand::Analyze => {
                            hub.publish(&FeedMessage::analyze_ack());
                        }
                        ClientCommand::Control(request) => {
                            let reply = FeedMessage::ControlResult { result: execute(&control, request) };
                            write.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                        }
                        ClientCommand::Ignore => {}
                    },
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
        Ok(())
    }
    .await;

    hub.unsubscribe(id);
    outcome
}
