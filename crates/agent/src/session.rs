//! One conversation: its rolling window plus per-session state.

use chrono::{DateTime, Utc};
use neutro_core::{Role, SessionId, StoredSession, Turn};
use neutro_memory::MessageStore;

use crate::onboarding::Onboarding;

/// Titles derived from the first user message are cut to this many chars.
const MAX_TITLE_CHARS: usize = 60;

/// A chat session owned by exactly one caller at a time.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: SessionId,

    /// Persona the session was opened with
    pub persona: String,

    pub created_at: DateTime<Utc>,

    /// Explicit title; derived from the first user turn when unset
    pub title: Option<String>,

    store: MessageStore,
    onboarding: Onboarding,
    user_id: Option<String>,
}

impl ChatSession {
    pub fn new(persona: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: SessionId::new(),
            persona: persona.into(),
            created_at: Utc::now(),
            title: None,
            store: MessageStore::new(capacity),
            onboarding: Onboarding::new(),
            user_id: None,
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    /// Bind the session to a ledger user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MessageStore {
        &mut self.store
    }

    pub fn onboarding(&self) -> &Onboarding {
        &self.onboarding
    }

    pub fn onboarding_mut(&mut self) -> &mut Onboarding {
        &mut self.onboarding
    }

    /// Start over: empty window, onboarding back at the opening step.
    pub fn reset(&mut self) {
        self.store.clear();
        self.onboarding.reset();
        self.title = None;
    }

    /// The explicit title, or the first user message truncated.
    pub fn title_or_default(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        self.store
            .iter()
            .find(|t| t.role() == Role::User)
            .map(|t| truncate_chars(t.content().trim(), MAX_TITLE_CHARS))
            .unwrap_or_else(|| "Nueva conversación".to_string())
    }

    pub fn to_stored(&self) -> StoredSession {
        let turns: Vec<Turn> = self.store.iter().cloned().collect();
        StoredSession::new(self.id.as_str(), self.title_or_default(), &turns)
    }

    /// Restore a saved session. Onboarding starts fresh; only turns persist.
    pub fn from_stored(stored: &StoredSession, persona: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: SessionId::from(&stored.id),
            persona: persona.into(),
            created_at: stored.timestamp,
            title: Some(stored.title.clone()),
            store: MessageStore::from_turns(capacity, stored.turns()),
            onboarding: Onboarding::new(),
            user_id: None,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}
