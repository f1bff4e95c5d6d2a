//! Conversation Transcript
//!
//! The transcript is the ordered list of conversation items shown to the user.
//! Message items are keyed by the identifier the remote peer assigns them and are
//! amended by later events; breadcrumbs are local audit entries with generated ids.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fmt};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for ItemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRole::User => write!(f, "user"),
            ItemRole::Assistant => write!(f, "assistant"),
            ItemRole::System => write!(f, "system"),
        }
    }
}

/// Lifecycle of a transcript item. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// A user or assistant utterance mirrored from the remote conversation.
    Message,
    /// A local, non-conversational note (tool calls, session start, errors).
    Breadcrumb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub item_id: String,
    pub kind: ItemKind,
    pub role: ItemRole,
    pub text: String,
    /// Structured payload attached to breadcrumbs.
    pub data: Option<Value>,
    pub status: ItemStatus,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Transcript item not found: {0}")]
    UnknownItem(String),
}

/// Storage contract for the conversation transcript.
///
/// Every operation is keyed by item id, so calls touching unrelated items never
/// depend on each other.
#[async_trait]
pub trait Transcript: Send + Sync {
    /// Creates a message item with status `InProgress`.
    ///
    /// Returns `false` and leaves the transcript untouched when an item with
    /// the same id already exists.
    async fn create(&self, item_id: &str, role: ItemRole, text: &str) -> bool;

    /// Appends a streamed fragment to an item's text.
    async fn append(&self, item_id: &str, delta: &str) -> Result<(), TranscriptError>;

    /// Overwrites an item's text.
    async fn replace(&self, item_id: &str, text: &str) -> Result<(), TranscriptError>;

    /// Moves an item to `status`. A `Done` item never goes back to `InProgress`.
    async fn set_status(&self, item_id: &str, status: ItemStatus) -> Result<(), TranscriptError>;

    /// Records a breadcrumb and returns its generated id.
    async fn add_breadcrumb(&self, title: &str, data: Option<Value>) -> String;

    async fn get(&self, item_id: &str) -> Option<TranscriptItem>;

    /// Returns all items in creation order.
    async fn snapshot(&self) -> Vec<TranscriptItem>;
}

#[derive(Default)]
struct Items {
    ordered: Vec<TranscriptItem>,
    by_id: HashMap<String, usize>,
}

impl Items {
    fn get_mut(&mut self, item_id: &str) -> Result<&mut TranscriptItem, TranscriptError> {
        let idx = *self
            .by_id
            .get(item_id)
            .ok_or_else(|| TranscriptError::UnknownItem(item_id.to_string()))?;
        Ok(&mut self.ordered[idx])
    }

    fn push(&mut self, item: TranscriptItem) {
        self.by_id.insert(item.item_id.clone(), self.ordered.len());
        self.ordered.push(item);
    }
}

/// The default transcript, held in memory for the lifetime of a session.
#[derive(Default)]
pub struct InMemoryTranscript {
    items: RwLock<Items>,
}

impl InMemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transcript for InMemoryTranscript {
    async fn create(&self, item_id: &str, role: ItemRole, text: &str) -> bool {
        let mut items = self.items.write().await;
        if items.by_id.contains_key(item_id) {
            return false;
        }
        items.push(TranscriptItem {
            item_id: item_id.to_string(),
            kind: ItemKind::Message,
            role,
            text: text.to_string(),
            data: None,
            status: ItemStatus::InProgress,
            created_at: Local::now(),
        });
        true
    }

    async fn append(&self, item_id: &str, delta: &str) -> Result<(), TranscriptError> {
        let mut items = self.items.write().await;
        items.get_mut(item_id)?.text.push_str(delta);
        Ok(())
    }

    async fn replace(&self, item_id: &str, text: &str) -> Result<(), TranscriptError> {
        let mut items = self.items.write().await;
        items.get_mut(item_id)?.text = text.to_string();
        Ok(())
    }

    async fn set_status(&self, item_id: &str, status: ItemStatus) -> Result<(), TranscriptError> {
        let mut items = self.items.write().await;
        let item = items.get_mut(item_id)?;
        if item.status != ItemStatus::Done {
            item.status = status;
        }
        Ok(())
    }

    async fn add_breadcrumb(&self, title: &str, data: Option<Value>) -> String {
        let item_id = format!("breadcrumb-{}", Uuid::new_v4());
        let mut items = self.items.write().await;
        items.push(TranscriptItem {
            item_id: item_id.clone(),
            kind: ItemKind::Breadcrumb,
            role: ItemRole::System,
            text: title.to_string(),
            data,
            status: ItemStatus::Done,
            created_at: Local::now(),
        });
        item_id
    }

    async fn get(&self, item_id: &str) -> Option<TranscriptItem> {
        let items = self.items.read().await;
        items.by_id.get(item_id).map(|&idx| items.ordered[idx].clone())
    }

    async fn snapshot(&self) -> Vec<TranscriptItem> {
        self.items.read().await.ordered.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let transcript = InMemoryTranscript::new();

        assert!(transcript.create("i1", ItemRole::User, "hello").await);
        assert!(!transcript.create("i1", ItemRole::Assistant, "other").await);

        let items = transcript.snapshot().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].role, ItemRole::User);
        assert_eq!(items[0].text, "hello");
        assert_eq!(items[0].status, ItemStatus::InProgress);
        assert_eq!(items[0].kind, ItemKind::Message);
    }

    #[tokio::test]
    async fn test_append_and_replace() {
        let transcript = InMemoryTranscript::new();
        transcript.create("a1", ItemRole::Assistant, "").await;

        transcript.append("a1", "Hel").await.unwrap();
        transcript.append("a1", "lo").await.unwrap();
        assert_eq!(transcript.get("a1").await.unwrap().text, "Hello");

        transcript.replace("a1", "Bye").await.unwrap();
        assert_eq!(transcript.get("a1").await.unwrap().text, "Bye");
    }

    #[tokio::test]
    async fn test_unknown_item_errors() {
        let transcript = InMemoryTranscript::new();

        assert_eq!(
            transcript.append("missing", "x").await,
            Err(TranscriptError::UnknownItem("missing".to_string()))
        );
        assert!(transcript.replace("missing", "x").await.is_err());
        assert!(
            transcript
                .set_status("missing", ItemStatus::Done)
                .await
                .is_err()
        );
        assert!(transcript.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_status_never_regresses() {
        let transcript = InMemoryTranscript::new();
        transcript.create("i1", ItemRole::Assistant, "").await;

        transcript.set_status("i1", ItemStatus::Done).await.unwrap();
        transcript.set_status("i1", ItemStatus::Done).await.unwrap();
        transcript
            .set_status("i1", ItemStatus::InProgress)
            .await
            .unwrap();

        assert_eq!(
            transcript.get("i1").await.unwrap().status,
            ItemStatus::Done
        );
    }

    #[tokio::test]
    async fn test_breadcrumbs_keep_order_and_data() {
        let transcript = InMemoryTranscript::new();
        transcript.create("i1", ItemRole::User, "hi").await;
        let id = transcript
            .add_breadcrumb("function call: lookup", Some(json!({ "q": 1 })))
            .await;
        transcript.create("i2", ItemRole::Assistant, "").await;

        let items = transcript.snapshot().await;
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["i1", id.as_str(), "i2"]);

        let crumb = &items[1];
        assert_eq!(crumb.kind, ItemKind::Breadcrumb);
        assert_eq!(crumb.status, ItemStatus::Done);
        assert_eq!(crumb.text, "function call: lookup");
        assert_eq!(crumb.data, Some(json!({ "q": 1 })));
    }

    #[test]
    fn test_role_and_status_serialization() {
        assert_eq!(serde_json::to_string(&ItemRole::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&ItemStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        let role: ItemRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, ItemRole::User);
        assert_eq!(ItemRole::System.to_string(), "system");
    }
}
