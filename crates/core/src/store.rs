//! Session store trait — explicit persistence of chat sessions.
//!
//! Sessions live in process memory by default. A `SessionStore` is only
//! touched when a caller chooses to save one; the record layout is
//! `{id, title, messages: [{type, content}], timestamp}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{Role, Turn};

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredKind {
    User,
    Bot,
}

/// One message of a saved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "type")]
    pub kind: StoredKind,
    pub content: String,
}

impl StoredMessage {
    /// Convert a turn; system turns are never persisted.
    pub fn from_turn(turn: &Turn) -> Option<Self> {
        let kind = match turn.role() {
            Role::User => StoredKind::User,
            Role::Assistant => StoredKind::Bot,
            Role::System => return None,
        };
        Some(Self {
            kind,
            content: turn.content().to_string(),
        })
    }

    pub fn to_turn(&self) -> Turn {
        match self.kind {
            StoredKind::User => Turn::user(&self.content),
            StoredKind::Bot => Turn::assistant(&self.content),
        }
    }
}

/// A persisted chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session identifier
    pub id: String,

    /// Display title (generated or first user message)
    pub title: String,

    /// Messages in conversation order
    pub messages: Vec<StoredMessage>,

    /// When the session was last saved
    pub timestamp: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(id: impl Into<String>, title: impl Into<String>, turns: &[Turn]) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: turns.iter().filter_map(StoredMessage::from_turn).collect(),
            timestamp: Utc::now(),
        }
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.messages.iter().map(StoredMessage::to_turn).collect()
    }
}

/// The core SessionStore trait.
///
/// Implementations: in-memory, JSONL file, SQLite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "memory").
    fn name(&self) -> &str;

    /// Insert or replace a session by id.
    async fn save(&self, session: StoredSession) -> std::result::Result<(), StoreError>;

    /// Get a session by id.
    async fn get(&self, id: &str) -> std::result::Result<Option<StoredSession>, StoreError>;

    /// All sessions, newest first.
    async fn list(&self) -> std::result::Result<Vec<StoredSession>, StoreError>;

    /// Delete a session by id. Returns whether it existed.
    async fn delete(&self, id: &str) -> std::result::Result<bool, StoreError>;

    /// Remove every session.
    async fn clear(&self) -> std::result::Result<(), StoreError>;
}
