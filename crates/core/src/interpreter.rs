//! Event Interpreter
//!
//! Classifies each inbound realtime event and applies it to the transcript and
//! session state. Function calls found in a completed response are handed to the
//! [`ToolCoordinator`] as independent background tasks.
//!
//! Text for one item can arrive three ways: in the creation payload, as a full
//! replacement when input transcription completes, or as streamed deltas. Each
//! handler knows whether its event sets or appends.

use crate::{
    coordinator::{CoordinatorConfig, ToolCoordinator},
    emitter::{EventSink, LoggedSink},
    error::DispatchError,
    event_log::{Direction, EventLog},
    events::{
        AudioTranscriptDelta, EventKind, InputTranscriptionCompleted, ItemCreated,
        OutputEntry, OutputItemDone, ResponseDone, SessionCreated,
    },
    session::SessionState,
    transcript::{ItemRole, ItemStatus, Transcript},
};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Stand-in text for a user message whose audio is still being transcribed.
pub const TRANSCRIBING_PLACEHOLDER: &str = "[Transcribing...]";

/// Text stored when transcription finished without recognisable speech.
pub const INAUDIBLE: &str = "[inaudible]";

pub struct EventInterpreter {
    transcript: Arc<dyn Transcript>,
    session: Arc<SessionState>,
    coordinator: Arc<ToolCoordinator>,
    event_log: Arc<dyn EventLog>,
    pending: Mutex<JoinSet<()>>,
}

impl EventInterpreter {
    /// Wires an interpreter and its coordinator. Outbound events pass through
    /// `event_log` on their way to `sink`.
    pub fn new(
        session: Arc<SessionState>,
        transcript: Arc<dyn Transcript>,
        sink: Arc<dyn EventSink>,
        event_log: Arc<dyn EventLog>,
        config: CoordinatorConfig,
    ) -> Self {
        let sink: Arc<dyn EventSink> = Arc::new(LoggedSink::new(sink, event_log.clone()));
        let coordinator = Arc::new(ToolCoordinator::new(
            transcript.clone(),
            sink,
            session.clone(),
            config,
        ));
        Self {
            transcript,
            session,
            coordinator,
            event_log,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn transcript(&self) -> &Arc<dyn Transcript> {
        &self.transcript
    }

    /// Handles one event received as JSON text.
    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                self.event_log
                    .record(Direction::Inbound, &Value::String(text.to_string()))
                    .await;
                self.report(DispatchError::InvalidJson(e)).await;
            }
        }
    }

    /// Handles one inbound event. Never fails: any error is logged and, where
    /// the user should know, turned into a single transcript note.
    pub async fn handle(&self, event: Value) {
        self.event_log.record(Direction::Inbound, &event).await;

        let kind = match classify(&event) {
            Ok(kind) => kind,
            Err(e) => return self.report(e).await,
        };
        if let Err(e) = self.dispatch(kind, event).await {
            self.report(e).await;
        }
    }

    /// Waits for every tool call started so far, including ones started while
    /// waiting.
    pub async fn drain(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.pending.lock().await);
            if batch.is_empty() {
                return;
            }
            while let Some(joined) = batch.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Function call task did not complete");
                }
            }
        }
    }

    async fn report(&self, e: DispatchError) {
        match e.advisory_note() {
            Some(note) => {
                error!(error = %e, "Failed to process realtime event");
                self.transcript.add_breadcrumb(note, None).await;
            }
            None => warn!(error = %e, "Realtime event references an unknown item"),
        }
    }

    async fn dispatch(&self, kind: EventKind, event: Value) -> Result<(), DispatchError> {
        match kind {
            EventKind::SessionCreated => self.on_session_created(decode(kind, event)?).await,
            EventKind::ItemCreated => self.on_item_created(decode(kind, event)?).await,
            EventKind::InputTranscriptionCompleted => {
                self.on_transcription_completed(decode(kind, event)?).await
            }
            EventKind::AudioTranscriptDelta => self.on_transcript_delta(decode(kind, event)?).await,
            EventKind::ResponseDone => self.on_response_done(decode(kind, event)?).await,
            EventKind::OutputItemDone => self.on_output_item_done(decode(kind, event)?).await,
            EventKind::Other => {
                let event_type = event.get("type").and_then(Value::as_str);
                debug!(event_type, "Ignoring unhandled event");
                Ok(())
            }
        }
    }

    async fn on_session_created(&self, event: SessionCreated) -> Result<(), DispatchError> {
        let Some(session_id) = event.session.and_then(|s| s.id) else {
            debug!("session.created without a session id");
            return Ok(());
        };
        self.session.mark_connected();
        info!(%session_id, "Realtime session established");
        self.transcript
            .add_breadcrumb(
                &format!(
                    "session.id: {session_id}\nStarted at: {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                ),
                None,
            )
            .await;
        Ok(())
    }

    async fn on_item_created(&self, event: ItemCreated) -> Result<(), DispatchError> {
        let item = event.item;
        let Some(role) = item.role else {
            debug!(item_id = %item.id, "Skipping conversation item without a role");
            return Ok(());
        };

        let mut text = item.initial_text();
        if role == ItemRole::User && text.is_empty() {
            text = TRANSCRIBING_PLACEHOLDER;
        }
        if self.transcript.create(&item.id, role, text).await {
            debug!(item_id = %item.id, %role, "Transcript item created");
        } else {
            debug!(item_id = %item.id, "Ignoring duplicate conversation.item.created");
        }
        Ok(())
    }

    async fn on_transcription_completed(
        &self,
        event: InputTranscriptionCompleted,
    ) -> Result<(), DispatchError> {
        let text = match event.transcript.as_deref() {
            None | Some("") | Some("\n") => INAUDIBLE,
            Some(transcript) => transcript,
        };
        self.transcript.replace(&event.item_id, text).await?;
        Ok(())
    }

    async fn on_transcript_delta(&self, event: AudioTranscriptDelta) -> Result<(), DispatchError> {
        let delta = event.delta.unwrap_or_default();
        self.transcript.append(&event.item_id, &delta).await?;
        Ok(())
    }

    async fn on_response_done(&self, event: ResponseDone) -> Result<(), DispatchError> {
        let calls: Vec<_> = event
            .response
            .and_then(|r| r.output)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<OutputEntry>(entry) {
                Ok(entry) => entry.function_call(),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable response output entry");
                    None
                }
            })
            .collect();
        if calls.is_empty() {
            return Ok(());
        }

        // Every call in this turn runs as the agent selected right now.
        let acting_agent = self.session.selected_agent();
        info!(count = calls.len(), agent = %acting_agent, "Dispatching function calls");

        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        for call in calls {
            let span = info_span!("tool_call", name = %call.name, call_id = %call.call_id);
            let coordinator = self.coordinator.clone();
            let agent = acting_agent.clone();
            pending.spawn(async move { coordinator.run(call, agent).await }.instrument(span));
        }
        Ok(())
    }

    async fn on_output_item_done(&self, event: OutputItemDone) -> Result<(), DispatchError> {
        self.transcript
            .set_status(&event.item.id, ItemStatus::Done)
            .await?;
        Ok(())
    }
}

fn classify(event: &Value) -> Result<EventKind, DispatchError> {
    event
        .get("type")
        .and_then(Value::as_str)
        .map(EventKind::from_type)
        .ok_or(DispatchError::Unclassifiable)
}

fn decode<T: DeserializeOwned>(kind: EventKind, event: Value) -> Result<T, DispatchError> {
    serde_json::from_value(event).map_err(|source| DispatchError::Malformed { kind, source })
}
