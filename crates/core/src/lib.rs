//! Switchboard Core
//!
//! Event dispatch and session state for realtime voice/text agent sessions.
//! Inbound server events update an in-memory transcript; function calls the
//! remote model requests are served by the acting agent's tools (or handed off
//! to another agent) and answered with outbound events.
//!
//! The transport is not part of this crate: feed events to
//! [`EventInterpreter::handle`] and deliver whatever reaches your [`EventSink`].

pub mod agents;
pub mod coordinator;
pub mod emitter;
pub mod error;
pub mod event_log;
pub mod events;
pub mod interpreter;
pub mod session;
pub mod transcript;

pub use agents::{AgentConfig, AgentSet, ToolDefinition, ToolHandler, tool_fn};
pub use coordinator::{CallOutcome, CoordinatorConfig, ToolCoordinator};
pub use emitter::{EventSink, RecordingSink};
pub use error::DispatchError;
pub use event_log::{EventLog, InMemoryEventLog, TracingEventLog};
pub use events::{ClientEvent, FunctionCallRequest};
pub use interpreter::EventInterpreter;
pub use session::{SessionState, SessionStatus};
pub use transcript::{InMemoryTranscript, Transcript, TranscriptItem};
