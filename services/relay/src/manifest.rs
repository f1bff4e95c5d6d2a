//! Agent Manifest
//!
//! Loads the agent set from a JSON file. Tools declared in a manifest answer with
//! a fixed `output` value, which is enough to exercise a conversation flow end to
//! end before real tool logic exists.
//!
//! ```json
//! {
//!   "agents": [
//!     {
//!       "name": "greeter",
//!       "public_description": "Greets the user",
//!       "instructions": "Greet the user, then transfer to billing.",
//!       "downstream_agents": ["billing"],
//!       "tools": [
//!         {
//!           "name": "lookup_order",
//!           "description": "Looks up an order",
//!           "parameters": { "type": "object", "properties": {} },
//!           "output": { "status": "shipped" }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{collections::HashSet, path::Path, sync::Arc};
use switchboard_core::{
    AgentConfig, AgentSet, ToolDefinition, ToolHandler, TranscriptItem,
};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read agent manifest {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Invalid agent manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Agent manifest defines no agents")]
    Empty,
    #[error("Agent '{0}' is defined more than once")]
    DuplicateAgent(String),
    #[error("Agent '{0}' lists unknown downstream agent '{1}'")]
    UnknownDownstream(String, String),
}

#[derive(Deserialize, Debug)]
struct Manifest {
    agents: Vec<AgentEntry>,
}

#[derive(Deserialize, Debug)]
struct AgentEntry {
    name: String,
    #[serde(default)]
    public_description: String,
    #[serde(default)]
    instructions: String,
    #[serde(default)]
    downstream_agents: Vec<String>,
    #[serde(default)]
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize, Debug)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    parameters: Value,
    output: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// A tool that always answers with the same value.
pub struct StaticTool {
    output: Value,
}

impl StaticTool {
    pub fn new(output: Value) -> Self {
        Self { output }
    }
}

#[async_trait]
impl ToolHandler for StaticTool {
    async fn call(&self, _args: Value, _transcript: &[TranscriptItem]) -> Result<Value> {
        Ok(self.output.clone())
    }
}

pub fn load_agents(path: &Path) -> Result<AgentSet, ManifestError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ManifestError::Io(path.display().to_string(), e))?;
    let agents = parse_agents(&raw)?;
    info!(path = %path.display(), agents = ?agents.names(), "Loaded agent manifest");
    Ok(agents)
}

pub fn parse_agents(raw: &str) -> Result<AgentSet, ManifestError> {
    let manifest: Manifest = serde_json::from_str(raw)?;
    if manifest.agents.is_empty() {
        return Err(ManifestError::Empty);
    }

    let mut names = HashSet::new();
    for agent in &manifest.agents {
        if !names.insert(agent.name.as_str()) {
            return Err(ManifestError::DuplicateAgent(agent.name.clone()));
        }
    }
    for agent in &manifest.agents {
        if let Some(unknown) = agent
            .downstream_agents
            .iter()
            .find(|d| !names.contains(d.as_str()))
        {
            return Err(ManifestError::UnknownDownstream(
                agent.name.clone(),
                unknown.clone(),
            ));
        }
    }

    let agents = manifest
        .agents
        .into_iter()
        .map(|entry| {
            let mut agent = AgentConfig::new(entry.name)
                .with_description(entry.public_description)
                .with_instructions(entry.instructions);
            for tool in entry.tools {
                agent = agent.with_tool(
                    ToolDefinition::function(tool.name, tool.description, tool.parameters),
                    Arc::new(StaticTool::new(tool.output)),
                );
            }
            for downstream in entry.downstream_agents {
                agent = agent.with_downstream(downstream);
            }
            agent
        })
        .collect();
    Ok(AgentSet::new(agents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use switchboard_core::agents::{TRANSFER_AGENTS_TOOL, ToolTarget};

    const MANIFEST: &str = r#"{
        "agents": [
            {
                "name": "greeter",
                "public_description": "Greets the user",
                "instructions": "Be brief.",
                "downstream_agents": ["billing"],
                "tools": [
                    { "name": "lookup_order", "output": { "status": "shipped" } }
                ]
            },
            { "name": "billing", "public_description": "Handles invoices" }
        ]
    }"#;

    #[tokio::test]
    async fn test_parse_manifest() {
        let agents = parse_agents(MANIFEST).unwrap();
        assert_eq!(agents.names(), vec!["greeter", "billing"]);

        let greeter = agents.get("greeter").unwrap();
        assert_eq!(greeter.instructions, "Be brief.");
        assert_eq!(greeter.tools[0].parameters, empty_object_schema());

        let tools = agents.tool_definitions("greeter");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1].name, TRANSFER_AGENTS_TOOL);

        let ToolTarget::Registered(handler) = agents.resolve_tool("greeter", "lookup_order") else {
            panic!("lookup_order should be registered");
        };
        let result = handler.call(json!({}), &[]).await.unwrap();
        assert_eq!(result, json!({ "status": "shipped" }));
    }

    #[test]
    fn test_manifest_validation() {
        assert!(matches!(
            parse_agents(r#"{ "agents": [] }"#),
            Err(ManifestError::Empty)
        ));
        assert!(matches!(
            parse_agents(r#"{ "agents": [{ "name": "a" }, { "name": "a" }] }"#),
            Err(ManifestError::DuplicateAgent(name)) if name == "a"
        ));
        assert!(matches!(
            parse_agents(r#"{ "agents": [{ "name": "a", "downstream_agents": ["b"] }] }"#),
            Err(ManifestError::UnknownDownstream(agent, target)) if agent == "a" && target == "b"
        ));
        assert!(matches!(
            parse_agents(r#"{ "agents": [{ "name": "a", "tools": [{ "name": "t" }] }] }"#),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_load_agents_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let agents = load_agents(file.path()).unwrap();
        assert!(agents.contains("billing"));

        let err = load_agents(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(..)));
    }
}
