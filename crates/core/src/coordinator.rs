//! Tool Invocation Coordinator
//!
//! Fulfils one function call requested by the remote model: runs the acting
//! agent's tool, performs an agent handoff, or answers with a generic fallback,
//! and then reports back to the peer.
//!
//! Every path ends with a `function_call_output` event so the peer's turn never
//! waits on a call that went nowhere. All paths except the handoff also send a
//! `response.create` to let the model continue; after a transfer the peer
//! continues on its own.

use crate::{
    agents::{DESTINATION_AGENT_ARG, ToolHandler, ToolTarget},
    emitter::EventSink,
    error::DispatchError,
    events::{ClientEvent, FunctionCallRequest},
    session::SessionState,
    transcript::Transcript,
};
use futures::FutureExt;
use serde_json::{Value, json};
use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Upper bound on a single tool handler run. `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
}

/// How a function call was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// A registered tool produced this result.
    Completed(Value),
    HandedOff {
        destination: Option<String>,
        did_transfer: bool,
    },
    /// No local logic matched; the generic success result was sent.
    Fallback,
    /// The call could not be served; an error-shaped output was sent.
    Failed(String),
}

pub struct ToolCoordinator {
    transcript: Arc<dyn Transcript>,
    sink: Arc<dyn EventSink>,
    session: Arc<SessionState>,
    config: CoordinatorConfig,
}

impl ToolCoordinator {
    pub fn new(
        transcript: Arc<dyn Transcript>,
        sink: Arc<dyn EventSink>,
        session: Arc<SessionState>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            transcript,
            sink,
            session,
            config,
        }
    }

    /// Fire-and-forget entry point: runs [`invoke`](Self::invoke) and reports a
    /// failure to deliver the answer in the logs and the transcript.
    pub async fn run(&self, call: FunctionCallRequest, acting_agent: String) {
        let name = call.name.clone();
        match self.invoke(call, &acting_agent).await {
            Ok(outcome) => info!(?outcome, "Function call answered"),
            Err(e) => {
                error!(error = %e, "Function call could not be answered");
                self.transcript
                    .add_breadcrumb(
                        &format!("function call error: {name}"),
                        Some(json!({ "error": e.to_string() })),
                    )
                    .await;
            }
        }
    }

    /// Answers one function call on behalf of `acting_agent`.
    ///
    /// The acting agent is fixed by the caller when the call is dispatched, so a
    /// handoff completing concurrently does not change which agent's tools
    /// serve this call.
    pub async fn invoke(
        &self,
        call: FunctionCallRequest,
        acting_agent: &str,
    ) -> Result<CallOutcome, DispatchError> {
        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(name = %call.name, call_id = %call.call_id, error = %e, "Invalid function call arguments");
                return self
                    .fail(&call, format!("Invalid function call arguments: {e}"))
                    .await;
            }
        };

        if !self.session.agents().contains(acting_agent) {
            warn!(agent = %acting_agent, "Acting agent is not configured");
        }
        self.transcript
            .add_breadcrumb(&format!("function call: {}", call.name), Some(args.clone()))
            .await;

        match self.session.agents().resolve_tool(acting_agent, &call.name) {
            ToolTarget::Registered(handler) => self.run_tool(&call, handler, args).await,
            ToolTarget::Handoff => self.hand_off(&call, &args).await,
            ToolTarget::Fallback => self.fallback(&call).await,
        }
    }

    async fn run_tool(
        &self,
        call: &FunctionCallRequest,
        handler: Arc<dyn ToolHandler>,
        args: Value,
    ) -> Result<CallOutcome, DispatchError> {
        info!(name = %call.name, call_id = %call.call_id, "Executing tool");
        let snapshot = self.transcript.snapshot().await;
        let execution = AssertUnwindSafe(handler.call(args, &snapshot)).catch_unwind();

        let finished = match self.config.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(finished) => finished,
                Err(_) => {
                    return self
                        .fail(call, format!("Tool timed out after {}ms", limit.as_millis()))
                        .await;
                }
            },
            None => execution.await,
        };

        let result = match finished {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return self.fail(call, format!("Tool failed: {e:#}")).await,
            Err(_) => return self.fail(call, "Tool panicked".to_string()).await,
        };

        self.transcript
            .add_breadcrumb(
                &format!("function call result: {}", call.name),
                Some(result.clone()),
            )
            .await;
        self.emit(ClientEvent::function_call_output(&call.call_id, &result))
            .await?;
        self.emit(ClientEvent::ResponseCreate).await?;
        Ok(CallOutcome::Completed(result))
    }

    async fn hand_off(
        &self,
        call: &FunctionCallRequest,
        args: &Value,
    ) -> Result<CallOutcome, DispatchError> {
        let destination = args
            .get(DESTINATION_AGENT_ARG)
            .and_then(Value::as_str)
            .map(str::to_string);
        let did_transfer = destination
            .as_deref()
            .is_some_and(|name| self.session.agents().contains(name));
        if !did_transfer {
            warn!(destination = ?destination, "Handoff target is not a configured agent");
        }

        let output = json!({
            "destination_agent": destination,
            "did_transfer": did_transfer,
        });
        self.emit(ClientEvent::function_call_output(&call.call_id, &output))
            .await?;
        // Switch only once the peer has been told about the transfer.
        if let Some(name) = destination.as_deref().filter(|_| did_transfer) {
            self.session.select_agent(name);
        }
        self.transcript
            .add_breadcrumb(
                &format!("function call: {} response", call.name),
                Some(output),
            )
            .await;
        Ok(CallOutcome::HandedOff {
            destination,
            did_transfer,
        })
    }

    async fn fallback(&self, call: &FunctionCallRequest) -> Result<CallOutcome, DispatchError> {
        warn!(name = %call.name, "No local logic for function; answering with fallback result");
        let result = json!({ "result": true });
        self.transcript
            .add_breadcrumb(
                &format!("function call fallback: {}", call.name),
                Some(result.clone()),
            )
            .await;
        self.emit(ClientEvent::function_call_output(&call.call_id, &result))
            .await?;
        self.emit(ClientEvent::ResponseCreate).await?;
        Ok(CallOutcome::Fallback)
    }

    async fn fail(
        &self,
        call: &FunctionCallRequest,
        message: String,
    ) -> Result<CallOutcome, DispatchError> {
        error!(name = %call.name, call_id = %call.call_id, %message, "Function call failed");
        let output = json!({ "error": message });
        self.transcript
            .add_breadcrumb(
                &format!("function call error: {}", call.name),
                Some(output.clone()),
            )
            .await;
        self.emit(ClientEvent::function_call_output(&call.call_id, &output))
            .await?;
        self.emit(ClientEvent::ResponseCreate).await?;
        Ok(CallOutcome::Failed(message))
    }

    async fn emit(&self, event: ClientEvent) -> Result<(), DispatchError> {
        let event_type = event.event_type();
        self.sink
            .send(event)
            .await
            .map_err(|source| DispatchError::Emit { event_type, source })
    }
}
