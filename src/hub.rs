//! Fan-out of serialized messages to every live observer.
//!
//! Each observer owns the receiving half of an unbounded channel. Publishing
//! never waits on a slow observer; a closed receiver is pruned on the next
//! publish. Every observer sees messages in global publish order.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::logging::{log, log_failure, obj, Category, Level};

pub type ObserverId = u64;

#[derive(Debug)]
pub struct Subscription {
    pub id: ObserverId,
    pub rx: mpsc::UnboundedReceiver<String>,
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: ObserverId,
    observers: BTreeMap<ObserverId, mpsc::UnboundedSender<String>>,
}

#[derive(Debug, Default)]
pub struct BroadcastHub {
    inner: Mutex<HubInner>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.observers.insert(id, tx);
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.observers.remove(&id);
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).observers.len()
    }

    /// Deliver `text` to every observer. Returns the number of successful
    /// deliveries; observers whose channel is closed are dropped.
    pub fn publish_text(&self, text: &str) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in inner.observers.iter() {
            if tx.send(text.to_string()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.observers.remove(&id);
            log(Level::Info, Category::Feed, "observer_dropped", obj(&[("observer", id.into())]));
        }
        delivered
    }

    pub fn publish<T: Serialize>(&self, message: &T) -> usize {
        match serde_json::to_string(message) {
            Ok(text) => self.publish_text(&text),
            Err(err) => {
                log_failure(Category::Feed, "publish_encode_failed", &err);
                0
            }
        }
    }
}
