//! Raw event log, kept for debugging: every inbound event before it is
//! interpreted and every outbound event as it is sent.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub direction: Direction,
    pub event_type: String,
    pub payload: Value,
    pub at: DateTime<Local>,
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn record(&self, direction: Direction, payload: &Value);
}

fn event_type(payload: &Value) -> &str {
    payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("<untyped>")
}

/// Keeps every event in memory, in the order recorded.
#[derive(Default)]
pub struct InMemoryEventLog {
    entries: Mutex<Vec<LoggedEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<LoggedEvent> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn record(&self, direction: Direction, payload: &Value) {
        self.entries.lock().await.push(LoggedEvent {
            direction,
            event_type: event_type(payload).to_string(),
            payload: payload.clone(),
            at: Local::now(),
        });
    }
}

/// Writes events to the `tracing` debug stream only.
pub struct TracingEventLog;

#[async_trait]
impl EventLog for TracingEventLog {
    async fn record(&self, direction: Direction, payload: &Value) {
        debug!(?direction, event_type = event_type(payload), %payload, "Realtime event");
    }
}
