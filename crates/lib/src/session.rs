//! Conversation sessions and message history for the decision loop.
//!
//! Sessions are keyed by id and hold an append-only list of messages (user/agent).
//! The loop reads a session's history at the start of a turn and appends to it only
//! when the turn completes without a collaborator failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// A single message in a conversation. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation: session id and ordered message history.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: SessionId,
    pub messages: Vec<Message>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
}

/// In-memory store for conversations (create, get, append).
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, Conversation>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new conversation with a generated id; returns the session id.
    pub async fn create(&self) -> SessionId {
        let id = format!("sess-{}", uuid::Uuid::new_v4());
        let conversation = Conversation {
            id: id.clone(),
            messages: Vec::new(),
        };
        self.inner.write().await.insert(id.clone(), conversation);
        id
    }

    /// Create a conversation with the given id if it does not exist; returns the id.
    pub async fn get_or_create(&self, id: impl Into<SessionId>) -> SessionId {
        let id = id.into();
        self.inner
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| Conversation {
                id: id.clone(),
                messages: Vec::new(),
            });
        id
    }

    /// Return a clone of the conversation if it exists.
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        self.inner.read().await.get(id).cloned()
    }

    /// Message history of a session; empty when the session does not exist.
    pub async fn history(&self, id: &str) -> Vec<Message> {
        self.inner
            .read()
            .await
            .get(id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    /// Append messages to the end of a conversation in one write.
    pub async fn append(
        &self,
        id: &str,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<(), SessionError> {
        let mut g = self.inner.write().await;
        let conversation = g
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        conversation.messages.extend(messages);
        Ok(())
    }

    /// Drop a conversation. Returns true if it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
