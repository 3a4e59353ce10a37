//! File-based session store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `StoredSession`. The whole file is loaded on
//! creation and rewritten on every mutation, which is fine for the handful of
//! sessions a single user keeps.
//!
//! Storage location: `~/.neutro/sessions.jsonl`

use async_trait::async_trait;
use neutro_core::error::StoreError;
use neutro_core::store::{SessionStore, StoredSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed session store using JSONL (one JSON object per line).
pub struct FileSessionStore {
    path: PathBuf,
    sessions: Arc<RwLock<Vec<StoredSession>>>,
}

impl FileSessionStore {
    /// Open the store at `path`; a missing file starts empty.
    pub fn new(path: PathBuf) -> Self {
        let sessions = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = sessions.len(), "File session store loaded");
        Self {
            path,
            sessions: Arc::new(RwLock::new(sessions)),
        }
    }

    fn load_from_disk(path: &Path) -> Vec<StoredSession> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredSession>(line) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted session line");
                    None
                }
            })
            .collect()
    }

    /// Rewrite the file from the given snapshot.
    fn flush(&self, sessions: &[StoredSession]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for session in sessions {
            let line = serde_json::to_string(session).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize session: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write session file: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, session: StoredSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => sessions.push(session),
        }
        self.flush(&sessions)
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
        let deleted = sessions.len() < len_before;
        if deleted {
            self.flush(&sessions)?;
        }
        Ok(deleted)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
        self.flush(&sessions)
    }
}
