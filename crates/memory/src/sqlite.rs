//! SQLite session store.
//!
//! One table, `chat_sessions`, with the message list stored as a JSON text
//! column. Saving an existing id replaces the row.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use neutro_core::error::StoreError;
use neutro_core::store::{SessionStore, StoredMessage, StoredSession};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id         TEXT PRIMARY KEY NOT NULL,
                title      TEXT NOT NULL,
                messages   TEXT NOT NULL DEFAULT '[]',
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_sessions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_sessions_timestamp ON chat_sessions(timestamp DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("timestamp index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<StoredSession, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let messages_json: String = row
            .try_get("messages")
            .map_err(|e| StoreError::QueryFailed(format!("messages column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| StoreError::QueryFailed(format!("timestamp column: {e}")))?;

        let messages: Vec<StoredMessage> = serde_json::from_str(&messages_json).unwrap_or_else(|e| {
            warn!(session_id = %id, error = %e, "Unreadable message column, treating as empty");
            Vec::new()
        });

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(StoredSession {
            id,
            title,
            messages,
            timestamp,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, session: StoredSession) -> Result<(), StoreError> {
        let messages = serde_json::to_string(&session.messages)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize messages: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (id, title, messages, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                messages = excluded.messages,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&session.id)
        .bind(&session.title)
        .bind(&messages)
        .bind(session.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("save: {e}")))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredSession>, StoreError> {
        let row = sqlx::query("SELECT id, title, messages, timestamp FROM chat_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list(&self) -> Result<Vec<StoredSession>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, messages, timestamp FROM chat_sessions ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chat_sessions")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("clear: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use neutro_core::Turn;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SqliteSessionStore {
        let path = dir.path().join("sessions.db");
        SqliteSessionStore::new(&format!("sqlite://{}", path.display()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let session = StoredSession::new(
            "s1",
            "Ahorro",
            &[Turn::user("¿Cómo ahorro?"), Turn::assistant("Empieza con un presupuesto.")],
        );
        store.save(session).await.unwrap();

        let got = store.get("s1").await.unwrap().unwrap();
        assert_eq!(got.title, "Ahorro");
        assert_eq!(got.messages.len(), 2);
        assert_eq!(got.turns()[0], Turn::user("¿Cómo ahorro?"));
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        store
            .save(StoredSession::new("s1", "first", &[Turn::user("a")]))
            .await
            .unwrap();
        store
            .save(StoredSession::new("s1", "second", &[Turn::user("a"), Turn::assistant("b")]))
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "second");
        assert_eq!(all[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let mut old = StoredSession::new("old", "old", &[]);
        old.timestamp = Utc::now() - Duration::hours(2);
        store.save(old).await.unwrap();
        store.save(StoredSession::new("new", "new", &[])).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        store.save(StoredSession::new("a", "a", &[])).await.unwrap();
        store.save(StoredSession::new("b", "b", &[])).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir).await;
            store.save(StoredSession::new("keep", "kept", &[Turn::user("x")])).await.unwrap();
        }
        let store = open(&dir).await;
        assert!(store.get("keep").await.unwrap().is_some());
    }
}
