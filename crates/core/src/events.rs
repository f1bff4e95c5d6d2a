//! Realtime wire events.
//!
//! Inbound events are classified by their `type` discriminant first and only
//! then decoded into the payload for that kind, so a malformed payload is
//! attributed to its own event kind instead of failing classification.

use crate::{agents::ToolDefinition, transcript::ItemRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The inbound event kinds this engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SessionCreated,
    ItemCreated,
    InputTranscriptionCompleted,
    AudioTranscriptDelta,
    ResponseDone,
    OutputItemDone,
    /// Anything else. Ignored so that new server event types are harmless.
    Other,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "session.created" => EventKind::SessionCreated,
            "conversation.item.created" => EventKind::ItemCreated,
            "conversation.item.input_audio_transcription.completed" => {
                EventKind::InputTranscriptionCompleted
            }
            "response.audio_transcript.delta" => EventKind::AudioTranscriptDelta,
            "response.done" => EventKind::ResponseDone,
            "response.output_item.done" => EventKind::OutputItemDone,
            _ => EventKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionCreated => "session.created",
            EventKind::ItemCreated => "conversation.item.created",
            EventKind::InputTranscriptionCompleted => {
                "conversation.item.input_audio_transcription.completed"
            }
            EventKind::AudioTranscriptDelta => "response.audio_transcript.delta",
            EventKind::ResponseDone => "response.done",
            EventKind::OutputItemDone => "response.output_item.done",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Inbound payloads ---

#[derive(Deserialize, Debug)]
pub struct SessionCreated {
    pub session: Option<SessionInfo>,
}

#[derive(Deserialize, Debug)]
pub struct SessionInfo {
    pub id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ItemCreated {
    pub item: CreatedItem,
}

#[derive(Deserialize, Debug)]
pub struct CreatedItem {
    pub id: String,
    /// Absent for non-message items such as `function_call`.
    pub role: Option<ItemRole>,
    pub content: Option<Vec<ContentPart>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ContentPart {
    pub text: Option<String>,
    pub transcript: Option<String>,
}

impl CreatedItem {
    /// Text of the first content part: its `text` when non-empty, otherwise
    /// its `transcript` when non-empty, otherwise the empty string.
    pub fn initial_text(&self) -> &str {
        let Some(first) = self.content.as_ref().and_then(|c| c.first()) else {
            return "";
        };
        [first.text.as_deref(), first.transcript.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

#[derive(Deserialize, Debug)]
pub struct InputTranscriptionCompleted {
    pub item_id: String,
    pub transcript: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AudioTranscriptDelta {
    pub item_id: String,
    pub delta: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseDone {
    pub response: Option<ResponseBody>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseBody {
    /// Kept raw so each entry decodes independently of its siblings.
    pub output: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub call_id: Option<String>,
    pub arguments: Option<String>,
}

impl OutputEntry {
    /// Returns the function call carried by this entry, if it is a
    /// `function_call` with both a name and a non-empty arguments payload.
    pub fn function_call(&self) -> Option<FunctionCallRequest> {
        if self.kind.as_deref() != Some("function_call") {
            return None;
        }
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        let arguments = self.arguments.as_deref().filter(|a| !a.is_empty())?;
        Some(FunctionCallRequest {
            name: name.to_string(),
            call_id: self.call_id.clone().unwrap_or_default(),
            arguments: arguments.to_string(),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct OutputItemDone {
    pub item: ItemRef,
}

#[derive(Deserialize, Debug)]
pub struct ItemRef {
    pub id: String,
}

/// A tool invocation requested by the remote model in a completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallRequest {
    pub name: String,
    pub call_id: String,
    /// Raw JSON text, parsed by the coordinator.
    pub arguments: String,
}

// --- Outbound events ---

/// Events this engine sends to the remote peer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ClientItem },
    /// Asks the peer to generate its next turn.
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientItem {
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: String,
}

impl ClientEvent {
    /// Wraps a tool result as a `function_call_output` item. The output is the
    /// compact JSON encoding of `result`.
    pub fn function_call_output(call_id: &str, result: &Value) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ClientItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: result.to_string(),
            },
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::SessionUpdate { .. } => "session.update",
        }
    }
}
