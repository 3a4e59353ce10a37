//! In-memory session store — useful for testing and ephemeral servers.

use async_trait::async_trait;
use neutro_core::error::StoreError;
use neutro_core::store::{SessionStore, StoredSession};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Saved sessions kept in a Vec, replaced by id on save.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<Vec<StoredSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, session: StoredSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => sessions.push(session),
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<StoredSession>, StoreError> {
        let mut sessions = self.sessions.read().await.clone();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;
        let len_before = sessions.len();
        sessions.retain(|s| s.id != id);
        Ok(sessions.len() < len_before)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.sessions.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use neutro_core::Turn;

    fn session(id: &str, age_mins: i64) -> StoredSession {
        let mut s = StoredSession::new(id, format!("chat {id}"), &[Turn::user("Hola")]);
        s.timestamp = Utc::now() - Duration::minutes(age_mins);
        s
    }

    #[tokio::test]
    async fn save_and_get() {
        let store = InMemorySessionStore::new();
        store.save(session("a", 0)).await.unwrap();
        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.title, "chat a");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_by_id() {
        let store = InMemorySessionStore::new();
        store.save(session("a", 0)).await.unwrap();
        let mut updated = session("a", 0);
        updated.title = "renamed".into();
        store.save(updated).await.unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "renamed");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemorySessionStore::new();
        store.save(session("old", 30)).await.unwrap();
        store.save(session("new", 1)).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = InMemorySessionStore::new();
        store.save(session("a", 0)).await.unwrap();
        store.save(session("b", 0)).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
