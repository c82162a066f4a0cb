//! End-to-end checks across the store, tailers, watchdog, control path
//! and websocket feed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message;

use synaptix::app::App;
use synaptix::config::{ConfigStore, Mode, Rules, SimConfig};
use synaptix::control::Control;
use synaptix::deferred::DeferredQueue;
use synaptix::domain::Domain;
use synaptix::feed::{self, pump_live};
use synaptix::generator::MARKET_CATALOG;
use synaptix::hub::BroadcastHub;
use synaptix::record::{Body, Record, Syslog, SyslogLevel};
use synaptix::remedy::Watchdog;
use synaptix::settings::Settings;
use synaptix::store::{Durability, EventLog};
use synaptix::tailer::DomainTailer;

fn open(dir: &TempDir) -> (Arc<ConfigStore>, Arc<EventLog>, Arc<BroadcastHub>) {
    let config = Arc::new(ConfigStore::load(dir.path().join("sim_config.json")).unwrap());
    let log = Arc::new(EventLog::open(dir.path().join("live_feed")).unwrap());
    (config, log, Arc::new(BroadcastHub::new()))
}

#[test]
fn manual_trigger_is_persisted_but_not_rebroadcast() {
    let dir = TempDir::new().unwrap();
    let (config, log, hub) = open(&dir);
    let control = Control::new(config, log.clone(), hub.clone());
    let mut live = DomainTailer::from_start(&log);
    let mut sub = hub.subscribe();

    let record = control.trigger("finance", &mut StdRng::seed_from_u64(3)).unwrap();
    let Body::Market(tick) = &record.body else { panic!("expected a market tick") };
    assert!(MARKET_CATALOG.iter().any(|s| s.symbol == tick.symbol));
    assert_eq!(tick.price, 0.0);
    assert!(record.is_manual);
    assert_eq!(log.last(Domain::Finance).unwrap().unwrap(), record);

    // Delivered exactly once: by the trigger path, never by the live tailer.
    assert_eq!(pump_live(&mut live, &hub), 0);
    assert!(sub.rx.try_recv().is_ok());
    assert!(sub.rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn watchdog_applies_mitigation_after_delay() {
    let dir = TempDir::new().unwrap();
    let (_config, log, _hub) = open(&dir);
    let queue = DeferredQueue::new();
    let mut watchdog = Watchdog::new(log.clone(), queue.clone(), Duration::from_secs(3));

    let fatal = Record::syslog(Syslog {
        service: "Payment-Gateway".into(),
        level: SyslogLevel::Fatal,
        message: "MEMORY LEAK - OOM KILLER INVOKED".into(),
        action_required: true,
    });
    log.append(Domain::Dev, &fatal, Durability::Synced).unwrap();
    assert_eq!(watchdog.scan(), 1);
    assert_eq!(watchdog.scan(), 0);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(log.replay(Domain::Dev).unwrap().len(), 1);

    queue.drain().await;
    let last = log.last(Domain::Dev).unwrap().unwrap();
    let Body::Syslog(s) = &last.body else { panic!("expected a syslog record") };
    assert_eq!(s.level, SyslogLevel::Info);
    assert_eq!(s.service, "Payment-Gateway");
    assert!(s.message.starts_with("AUTO-REMEDIATION"));
    assert!(s.message.contains("Garbage Collection"));

    // The corrective record itself must not be mitigated again.
    assert_eq!(watchdog.scan(), 0);
}

#[test]
fn config_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim_config.json");
    {
        let store = ConfigStore::load(&path).unwrap();
        store
            .replace(SimConfig { mode: Mode::Chaos, onset: 123.0, rules: Rules::default() })
            .unwrap();
    }
    let store = ConfigStore::load(&path).unwrap();
    let cfg = store.snapshot();
    assert_eq!(cfg.mode, Mode::Chaos);
    assert_eq!(cfg.onset, 123.0);
    assert_eq!(cfg.rules, Rules::default());
}

#[test]
fn tailers_never_redeliver() {
    let dir = TempDir::new().unwrap();
    let (_config, log, _hub) = open(&dir);
    let mut tailer = DomainTailer::from_start(&log);
    let mut rng = StdRng::seed_from_u64(11);

    let mut seen = 0;
    for round in 0..5 {
        for _ in 0..round {
            let rec = synaptix::generator::generate(Domain::Healthcare, false, false, &Rules::default(), &mut rng);
            log.append(Domain::Healthcare, &rec, Durability::Buffered).unwrap();
        }
        seen += tailer.poll(Domain::Healthcare).unwrap().len();
        assert!(tailer.poll(Domain::Healthcare).unwrap().is_empty());
    }
    assert_eq!(seen, 10);
    assert_eq!(log.replay(Domain::Healthcare).unwrap().len(), 10);
}

async fn recv_json(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn websocket_control_frames_and_analyze() {
    let dir = TempDir::new().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let mut settings = Settings::with_data_dir(dir.path());
    settings.feed_addr = format!("127.0.0.1:{}", port);

    let app = App::bootstrap(settings).unwrap();
    let hub = app.hub.clone();
    let control = app.control.clone();
    let addr = app.settings.feed_addr.clone();
    tokio::spawn(async move { feed::serve(&addr, hub, control).await });

    let url = format!("ws://127.0.0.1:{}", port);
    let mut ws = None;
    for _ in 0..50 {
        if let Ok((stream, _)) = tokio_tungstenite::connect_async(url.as_str()).await {
            ws = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut ws = ws.expect("feed server did not come up");

    ws.send(Message::Text(r#"{"op":"trigger","domain":"developer"}"#.into())).await.unwrap();
    let mut types = vec![];
    for _ in 0..2 {
        let msg = recv_json(&mut ws).await;
        if msg["type"] == "control_result" {
            assert_eq!(msg["result"]["status"], "success");
            assert_eq!(msg["result"]["payload"]["level"], "FATAL");
        } else {
            assert_eq!(msg["data"]["is_manual"], true);
        }
        types.push(msg["type"].as_str().unwrap().to_string());
    }
    types.sort();
    assert_eq!(types, vec!["control_result", "data_update"]);

    ws.send(Message::Text(r#"{"op":"trigger","domain":"weather"}"#.into())).await.unwrap();
    let msg = recv_json(&mut ws).await;
    assert_eq!(msg["result"]["status"], "error");

    ws.send(Message::Text("can you analyze this?".into())).await.unwrap();
    let msg = recv_json(&mut ws).await;
    assert_eq!(msg["type"], "agent_response");
    assert_eq!(msg["content"], feed::ANALYZE_ACK);
}
