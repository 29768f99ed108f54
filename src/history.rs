//! Conversation history persistence.
//!
//! The request pipeline only needs two operations, [`ConversationStore::append`]
//! and [`ConversationStore::load_ordered`]. Failures are reported as
//! [`LLMError::Persistence`]; the pipeline logs and swallows them.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::LLMError;

/// One stored conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub role: String,
    pub content: String,
}

/// Storage contract consumed by [`crate::RequestBuilder`].
pub trait ConversationStore: Send + Sync {
    /// Appends one turn to `conversation_id`.
    fn append(
        &self,
        conversation_id: &str,
        provider: &str,
        model: &str,
        role: &str,
        content: &str,
    ) -> Result<(), LLMError>;

    /// Every turn of `conversation_id`, oldest first.
    fn load_ordered(&self, conversation_id: &str) -> Result<Vec<HistoryRecord>, LLMError>;
}

/// Fresh identifier for grouping turns of a new conversation.
pub fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

/// SQLite-backed [`ConversationStore`].
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Opens (or creates) the database at `path` and ensures the table exists.
    /// `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self, LLMError> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|err| {
                        LLMError::persistence(format!("failed to create db directory: {err}"))
                    })?;
                }
            }
        }
        let conn = Connection::open(path)
            .map_err(|err| LLMError::persistence(format!("failed to open database: {err}")))?;
        let store = Self::from_connection(conn)?;
        info!(path, "conversation history store initialized");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, LLMError> {
        Self::open(":memory:")
    }

    /// Wraps an existing connection, creating the table if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, LLMError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversation_histories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS conversation_histories_conversation_id_index
                ON conversation_histories (conversation_id);",
        )
        .map_err(|err| LLMError::persistence(format!("failed to create table: {err}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn append(
        &self,
        conversation_id: &str,
        provider: &str,
        model: &str,
        role: &str,
        content: &str,
    ) -> Result<(), LLMError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO conversation_histories (conversation_id, provider, model, role, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![conversation_id, provider, model, role, content],
        )
        .map_err(|err| LLMError::persistence(format!("failed to append turn: {err}")))?;
        Ok(())
    }

    fn load_ordered(&self, conversation_id: &str) -> Result<Vec<HistoryRecord>, LLMError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare(
                "SELECT role, content FROM conversation_histories
                 WHERE conversation_id = ?1 ORDER BY id",
            )
            .map_err(|err| LLMError::persistence(format!("failed to prepare query: {err}")))?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok(HistoryRecord {
                    role: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|err| LLMError::persistence(format!("failed to load history: {err}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| LLMError::persistence(format!("failed to read history row: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_come_back_in_insertion_order_per_conversation() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store.append("a", "ollama", "llama3", "user", "Hello").unwrap();
        store.append("b", "openai", "gpt-4o", "user", "Other").unwrap();
        store.append("a", "ollama", "llama3", "assistant", "Hi there").unwrap();

        let turns = store.load_ordered("a").unwrap();
        assert_eq!(
            turns,
            vec![
                HistoryRecord { role: "user".into(), content: "Hello".into() },
                HistoryRecord { role: "assistant".into(), content: "Hi there".into() },
            ]
        );
        assert!(store.load_ordered("missing").unwrap().is_empty());
    }

    #[test]
    fn timestamps_are_filled_by_default() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store.append("a", "ollama", "llama3", "user", "Hello").unwrap();
        let conn = store.conn.lock().unwrap();
        let (created, updated): (String, String) = conn
            .query_row(
                "SELECT created_at, updated_at FROM conversation_histories",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(!created.is_empty());
        assert_eq!(created, updated);
    }

    #[test]
    fn dropped_table_surfaces_persistence_error() {
        let store = SqliteConversationStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE conversation_histories;")
            .unwrap();
        let err = store.append("a", "ollama", "llama3", "user", "Hello").unwrap_err();
        assert!(matches!(err, LLMError::Persistence { .. }));
    }

    #[test]
    fn conversation_ids_are_unique_uuids() {
        let first = new_conversation_id();
        assert_eq!(first.len(), 36);
        assert_ne!(first, new_conversation_id());
    }
}
