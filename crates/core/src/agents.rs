//! Agent and Tool Registry
//!
//! An agent is a named persona with instructions, the tools it may call, and the
//! agents it may hand the conversation off to. The registry is supplied by the
//! application and is fixed for the lifetime of a session.

use crate::transcript::TranscriptItem;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{collections::HashMap, fmt, future::Future, sync::Arc};

/// Reserved function name the remote model calls to switch agents.
pub const TRANSFER_AGENTS_TOOL: &str = "transferAgents";

/// Argument of [`TRANSFER_AGENTS_TOOL`] naming the target agent.
pub const DESTINATION_AGENT_ARG: &str = "destination_agent";

/// Local logic behind a function the remote model can call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with the parsed call arguments and a snapshot of the
    /// transcript taken just before the call.
    async fn call(&self, args: Value, transcript: &[TranscriptItem]) -> Result<Value>;
}

/// A `ToolHandler` backed by an async closure.
pub struct FnTool<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value, Vec<TranscriptItem>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, args: Value, transcript: &[TranscriptItem]) -> Result<Value> {
        (self.f)(args, transcript.to_vec()).await
    }
}

/// Builds a tool handler from an async closure.
pub fn tool_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, Vec<TranscriptItem>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnTool { f })
}

/// A function definition as advertised to the remote model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Clone, Default)]
pub struct AgentConfig {
    pub name: String,
    /// Short description shown to other agents when offering a handoff.
    pub public_description: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub tool_logic: HashMap<String, Arc<dyn ToolHandler>>,
    pub downstream_agents: Vec<String>,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.tool_logic.keys().collect();
        handlers.sort();
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("tool_logic", &handlers)
            .field("downstream_agents", &self.downstream_agents)
            .finish()
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.public_description = description.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Registers a tool: its advertised definition and the logic that serves it.
    pub fn with_tool(mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        self.tool_logic.insert(definition.name.clone(), handler);
        self.tools.push(definition);
        self
    }

    pub fn with_downstream(mut self, agent_name: impl Into<String>) -> Self {
        self.downstream_agents.push(agent_name.into());
        self
    }
}

/// What a function call name resolves to for a given agent.
pub enum ToolTarget {
    /// The acting agent registered logic under this name.
    Registered(Arc<dyn ToolHandler>),
    /// The reserved agent transfer directive.
    Handoff,
    /// Nothing local knows this name.
    Fallback,
}

impl fmt::Debug for ToolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolTarget::Registered(_) => write!(f, "Registered"),
            ToolTarget::Handoff => write!(f, "Handoff"),
            ToolTarget::Fallback => write!(f, "Fallback"),
        }
    }
}

/// The ordered set of agents available in a session.
#[derive(Debug, Clone, Default)]
pub struct AgentSet {
    agents: Vec<AgentConfig>,
}

impl AgentSet {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self { agents }
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn first(&self) -> Option<&AgentConfig> {
        self.agents.first()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// Resolves a function name against the tools of `agent_name`.
    ///
    /// Registered logic wins over the transfer directive, so an agent may
    /// override `transferAgents` with its own handler.
    pub fn resolve_tool(&self, agent_name: &str, tool_name: &str) -> ToolTarget {
        if let Some(handler) = self
            .get(agent_name)
            .and_then(|agent| agent.tool_logic.get(tool_name))
        {
            return ToolTarget::Registered(handler.clone());
        }
        if tool_name == TRANSFER_AGENTS_TOOL {
            ToolTarget::Handoff
        } else {
            ToolTarget::Fallback
        }
    }

    /// Function definitions to advertise for `agent_name`, including the
    /// transfer directive when the agent has downstream agents.
    pub fn tool_definitions(&self, agent_name: &str) -> Vec<ToolDefinition> {
        let Some(agent) = self.get(agent_name) else {
            return Vec::new();
        };
        let mut tools = agent.tools.clone();
        let downstream: Vec<&AgentConfig> = agent
            .downstream_agents
            .iter()
            .filter_map(|name| self.get(name))
            .collect();
        if !downstream.is_empty() {
            tools.push(transfer_tool_definition(&downstream));
        }
        tools
    }
}

fn transfer_tool_definition(downstream: &[&AgentConfig]) -> ToolDefinition {
    let listing: String = downstream
        .iter()
        .map(|a| format!("\n- {}: {}", a.name, a.public_description))
        .collect();
    let names: Vec<&str> = downstream.iter().map(|a| a.name.as_str()).collect();

    ToolDefinition::function(
        TRANSFER_AGENTS_TOOL,
        format!(
            "Transfers the user to a more specialized agent. Only call this when one of \
             the available agents fits the request better than you do, and tell the user \
             before transferring.\n\nAvailable agents:{listing}"
        ),
        json!({
            "type": "object",
            "properties": {
                "rationale_for_transfer": {
                    "type": "string",
                    "description": "Why this transfer is being made."
                },
                "conversation_context": {
                    "type": "string",
                    "description": "Context the receiving agent needs to continue the conversation."
                },
                DESTINATION_AGENT_ARG: {
                    "type": "string",
                    "description": "The agent that should take over.",
                    "enum": names
                }
            },
            "required": ["rationale_for_transfer", "conversation_context", DESTINATION_AGENT_ARG]
        }),
    )
}
