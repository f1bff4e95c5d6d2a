//! Session State
//!
//! Connection status and the currently acting agent for one realtime session.
//! The agent is published through a `watch` channel so the networking side can
//! react to a handoff (for example by refreshing the remote session's
//! instructions).

use crate::{
    agents::{AgentConfig, AgentSet},
    events::{ClientEvent, SessionUpdate},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No agents configured")]
    NoAgents,
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

pub struct SessionState {
    agents: Arc<AgentSet>,
    status: watch::Sender<SessionStatus>,
    selected_agent: watch::Sender<String>,
}

impl SessionState {
    /// Creates a disconnected session acting as `initial_agent`, or as the
    /// first configured agent when none is given.
    pub fn new(agents: AgentSet, initial_agent: Option<&str>) -> Result<Self, SessionError> {
        let selected = match initial_agent {
            Some(name) if agents.contains(name) => name.to_string(),
            Some(name) => return Err(SessionError::UnknownAgent(name.to_string())),
            None => agents.first().ok_or(SessionError::NoAgents)?.name.clone(),
        };
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        let (selected_agent, _) = watch::channel(selected);
        Ok(Self {
            agents: Arc::new(agents),
            status,
            selected_agent,
        })
    }

    pub fn agents(&self) -> &Arc<AgentSet> {
        &self.agents
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn mark_connecting(&self) -> bool {
        self.advance(SessionStatus::Connecting)
    }

    pub fn mark_connected(&self) -> bool {
        self.advance(SessionStatus::Connected)
    }

    /// Resets the session to `Disconnected`. The selected agent is kept.
    pub fn teardown(&self) {
        self.status.send_replace(SessionStatus::Disconnected);
        info!("Session torn down");
    }

    fn advance(&self, next: SessionStatus) -> bool {
        self.status.send_if_modified(|current| {
            if next > *current {
                info!(from = ?*current, to = ?next, "Session status changed");
                *current = next;
                true
            } else {
                if next < *current {
                    warn!(current = ?*current, requested = ?next, "Ignoring backwards session status change");
                }
                false
            }
        })
    }

    pub fn selected_agent(&self) -> String {
        self.selected_agent.borrow().clone()
    }

    pub fn selected_agent_config(&self) -> Option<&AgentConfig> {
        self.agents.get(&self.selected_agent.borrow())
    }

    pub fn subscribe_agent(&self) -> watch::Receiver<String> {
        self.selected_agent.subscribe()
    }

    /// The `session.update` event configuring the remote peer for the
    /// selected agent: its instructions and the functions it may call.
    pub fn session_update(&self) -> Option<ClientEvent> {
        let agent = self.selected_agent_config()?;
        Some(ClientEvent::SessionUpdate {
            session: SessionUpdate {
                instructions: agent.instructions.clone(),
                tools: self.agents.tool_definitions(&agent.name),
                tool_choice: "auto".to_string(),
            },
        })
    }

    /// Switches the acting agent. Only a handoff performed by the tool
    /// coordinator calls this. Returns `false` for an unknown agent.
    pub(crate) fn select_agent(&self, name: &str) -> bool {
        if !self.agents.contains(name) {
            return false;
        }
        let previous = self.selected_agent.send_replace(name.to_string());
        info!(from = %previous, to = %name, "Selected agent changed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> AgentSet {
        AgentSet::new(vec![AgentConfig::new("greeter"), AgentConfig::new("billing")])
    }

    #[test]
    fn test_initial_agent_selection() {
        let session = SessionState::new(agents(), None).unwrap();
        assert_eq!(session.selected_agent(), "greeter");

        let session = SessionState::new(agents(), Some("billing")).unwrap();
        assert_eq!(session.selected_agent(), "billing");
        assert_eq!(
            session.selected_agent_config().map(|a| a.name.as_str()),
            Some("billing")
        );

        assert_eq!(
            SessionState::new(agents(), Some("ghost")).err(),
            Some(SessionError::UnknownAgent("ghost".into()))
        );
        assert_eq!(
            SessionState::new(AgentSet::default(), None).err(),
            Some(SessionError::NoAgents)
        );
    }

    #[test]
    fn test_status_is_forward_only_until_teardown() {
        let session = SessionState::new(agents(), None).unwrap();
        assert_eq!(session.status(), SessionStatus::Disconnected);

        assert!(session.mark_connecting());
        assert!(session.mark_connected());
        assert!(!session.mark_connecting());
        assert!(!session.mark_connected());
        assert_eq!(session.status(), SessionStatus::Connected);

        session.teardown();
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.mark_connected());
    }

    #[test]
    fn test_session_update_follows_selected_agent() {
        let agents = AgentSet::new(vec![
            AgentConfig::new("greeter")
                .with_instructions("Greet warmly.")
                .with_downstream("billing"),
            AgentConfig::new("billing").with_instructions("Handle invoices."),
        ]);
        let session = SessionState::new(agents, None).unwrap();

        let Some(ClientEvent::SessionUpdate { session: update }) = session.session_update() else {
            panic!("Expected a session.update event");
        };
        assert_eq!(update.instructions, "Greet warmly.");
        assert_eq!(update.tools.len(), 1);
        assert_eq!(update.tools[0].name, crate::agents::TRANSFER_AGENTS_TOOL);

        session.select_agent("billing");
        let Some(ClientEvent::SessionUpdate { session: update }) = session.session_update() else {
            panic!("Expected a session.update event");
        };
        assert_eq!(update.instructions, "Handle invoices.");
        assert!(update.tools.is_empty());
    }

    #[test]
    fn test_select_agent_notifies_subscribers() {
        let session = SessionState::new(agents(), None).unwrap();
        let mut rx = session.subscribe_agent();

        assert!(!session.select_agent("ghost"));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.selected_agent(), "greeter");

        assert!(session.select_agent("billing"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "billing");
    }
}
