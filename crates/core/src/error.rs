//! Errors raised while dispatching inbound events.

use crate::{events::EventKind, transcript::TranscriptError};

/// Note written to the transcript when a single event could not be processed.
pub const MALFORMED_EVENT_NOTE: &str =
    "Error processing an incoming event. See logs for details.";

/// Note written to the transcript when an event could not even be classified.
pub const CRITICAL_EVENT_NOTE: &str =
    "A critical error occurred while processing server data. See logs for details.";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Inbound event is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Inbound event has no string `type` discriminant")]
    Unclassifiable,
    #[error("Malformed {kind} event: {source}")]
    Malformed {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error("Failed to emit {event_type}: {source}")]
    Emit {
        event_type: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// The transcript note this error should surface to the user, if any.
    ///
    /// Events that reference an item the transcript never saw are only logged:
    /// the peer routinely streams updates for items that are not mirrored.
    pub fn advisory_note(&self) -> Option<&'static str> {
        match self {
            DispatchError::InvalidJson(_) | DispatchError::Unclassifiable => {
                Some(CRITICAL_EVENT_NOTE)
            }
            DispatchError::Malformed { .. } | DispatchError::Emit { .. } => {
                Some(MALFORMED_EVENT_NOTE)
            }
            DispatchError::Transcript(TranscriptError::UnknownItem(_)) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_notes() {
        assert_eq!(
            DispatchError::Unclassifiable.advisory_note(),
            Some(CRITICAL_EVENT_NOTE)
        );

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let malformed = DispatchError::Malformed {
            kind: EventKind::ItemCreated,
            source,
        };
        assert_eq!(malformed.advisory_note(), Some(MALFORMED_EVENT_NOTE));
        assert!(
            malformed
                .to_string()
                .starts_with("Malformed conversation.item.created event")
        );

        let unknown = DispatchError::from(TranscriptError::UnknownItem("i9".into()));
        assert_eq!(unknown.advisory_note(), None);
        assert_eq!(unknown.to_string(), "Transcript item not found: i9");
    }
}
