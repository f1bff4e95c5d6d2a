//! Outbound Event Emitter
//!
//! The engine only builds outbound payloads. Delivering them to the remote peer
//! is the job of whatever implements [`EventSink`].

use crate::{
    event_log::{Direction, EventLog},
    events::ClientEvent,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<()>;
}

#[async_trait]
impl EventSink for mpsc::Sender<ClientEvent> {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        mpsc::Sender::send(self, event)
            .await
            .map_err(|_| anyhow!("Outbound event channel closed"))
    }
}

/// Records every outbound event in an [`EventLog`] before forwarding it.
pub struct LoggedSink {
    inner: Arc<dyn EventSink>,
    log: Arc<dyn EventLog>,
}

impl LoggedSink {
    pub fn new(inner: Arc<dyn EventSink>, log: Arc<dyn EventLog>) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl EventSink for LoggedSink {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        let payload = serde_json::to_value(&event)?;
        self.log.record(Direction::Outbound, &payload).await;
        self.inner.send(event).await
    }
}

/// A sink that keeps every event it receives. Useful for tests and offline runs.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::InMemoryEventLog;

    #[tokio::test]
    async fn test_logged_sink_records_then_forwards() {
        let recording = Arc::new(RecordingSink::new());
        let log = Arc::new(InMemoryEventLog::new());
        let sink = LoggedSink::new(recording.clone(), log.clone());

        sink.send(ClientEvent::ResponseCreate).await.unwrap();

        assert_eq!(recording.events().await, vec![ClientEvent::ResponseCreate]);
        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].direction, Direction::Outbound);
        assert_eq!(entries[0].event_type, "response.create");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = EventSink::send(&tx, ClientEvent::ResponseCreate)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
