//! SQLite-backed conversation store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use beacon_types::{Conversation, ConversationId, Message, MessageId, Role};

use crate::error::{Error, Result};
use crate::store::ConversationStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, seq);
CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);
"#;

/// Conversation store backed by SQLite.
///
/// All access goes through a single connection mutex, which also serializes
/// appends.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Persistence(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "Conversation store opened");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_conversation(conn: &Connection, id: &ConversationId) -> Result<Conversation> {
        let row = conn
            .query_row(
                r#"
                SELECT c.id, c.title, c.created_at, c.updated_at,
                       (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
                FROM conversations c
                WHERE c.id = ?1
                "#,
                params![id.as_str()],
                ConversationRow::from_row,
            )
            .optional()?;

        row.ok_or_else(|| Error::NotFound(id.to_string()))?
            .into_conversation()
    }
}

struct ConversationRow {
    id: String,
    title: Option<String>,
    created_at: String,
    updated_at: String,
    message_count: i64,
}

impl ConversationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            message_count: row.get(4)?,
        })
    }

    fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            id: ConversationId::from_string(self.id),
            title: self.title,
            created_at: parse_dt(&self.created_at)?,
            updated_at: parse_dt(&self.updated_at)?,
            message_count: self.message_count.max(0) as usize,
        })
    }
}

struct MessageRow {
    id: String,
    role: String,
    content: String,
    metadata: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            role: row.get(1)?,
            content: row.get(2)?,
            metadata: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_message(self) -> Result<Message> {
        let role: Role = self.role.parse().map_err(Error::Persistence)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Message {
            id: MessageId::from_string(self.id),
            role,
            content: self.content,
            metadata,
            created_at: parse_dt(&self.created_at)?,
        })
    }
}

fn parse_dt(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("Invalid timestamp '{}': {}", value, e)))
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = Conversation::new(title);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.id.as_str(),
                conversation.title,
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let conn = self.conn.lock();
        Self::load_conversation(&conn, id)
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.title, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
            FROM conversations c
            ORDER BY c.updated_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], ConversationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(ConversationRow::into_conversation).collect()
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id.as_str()])?;
        if affected == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        tracing::debug!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        Self::load_conversation(&conn, id)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, role, content, metadata, created_at
            FROM messages
            WHERE conversation_id = ?1
            ORDER BY seq ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![id.as_str()], MessageRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn append_message(&self, id: &ConversationId, message: Message) -> Result<()> {
        let metadata = message
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let touched = tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        if touched == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        tx.execute(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                message.id.as_str(),
                id.as_str(),
                message.role.as_str(),
                message.content,
                metadata,
                message.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
