//! SQLite-backed persistence for conversations and messages.

use crate::codec;
use crate::error::{Constraint, MemoryError, constraint_of};
use crate::model::{Conversation, Message, SearchResult};
use crate::similarity;
use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content TEXT NOT NULL,
    embedding BLOB,
    created_at TEXT NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
    ON messages(conversation_id, created_at);
CREATE INDEX IF NOT EXISTS idx_conversations_updated
    ON conversations(updated_at);
";

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, embedding, created_at";
const CONVERSATION_COLUMNS: &str = "id, title, created_at, updated_at";

/// Durable store owning the process's single SQLite connection.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        info!("opened memory store (path={})", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Release the connection, surfacing any close error.
    pub fn close(self) -> Result<(), MemoryError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, err)| MemoryError::Storage(err))?;
        debug!("closed memory store");
        Ok(())
    }

    /// Insert a new conversation stamped with the current time.
    pub fn create_conversation(&self, id: &str, title: &str) -> Result<Conversation, MemoryError> {
        let now = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, title, now, now],
        )
        .map_err(|err| match constraint_of(&err) {
            Some(Constraint::PrimaryKey) => MemoryError::DuplicateIdentity(id.to_string()),
            _ => MemoryError::Storage(err),
        })?;
        debug!("created conversation (id={}, title_len={})", id, title.len());
        Ok(Conversation {
            id: id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        })
    }

    /// Fetch a conversation with all of its messages, oldest first.
    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, MemoryError> {
        let conn = self.conn.lock();
        let conversation = conn
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                conversation_from_row,
            )
            .optional()?;
        let Some(mut conversation) = conversation else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 \
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map(params![id], message_from_row)?;
        for row in rows {
            conversation.messages.push(row.map_err(read_error)?);
        }
        Ok(Some(conversation))
    }

    /// Most recently updated conversations, newest first, without messages.
    pub fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>, MemoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             ORDER BY updated_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], conversation_from_row)?;
        let conversations = rows.collect::<Result<Vec<_>, _>>()?;
        debug!("listed conversations (returned={})", conversations.len());
        Ok(conversations)
    }

    /// The most recently updated conversation with its messages.
    pub fn get_last_conversation(&self) -> Result<Option<Conversation>, MemoryError> {
        let Some(latest) = self.list_conversations(1)?.into_iter().next() else {
            return Ok(None);
        };
        self.get_conversation(&latest.id)
    }

    /// Insert a message and touch its conversation's update time.
    pub fn save_message(&self, message: &Message) -> Result<(), MemoryError> {
        let embedding = message.embedding.as_deref().map(codec::encode);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                message.id,
                message.conversation_id,
                message.role,
                message.content,
                embedding,
                message.created_at,
            ],
        )
        .map_err(|err| match constraint_of(&err) {
            Some(Constraint::PrimaryKey) => MemoryError::DuplicateIdentity(message.id.clone()),
            Some(Constraint::ForeignKey) => {
                MemoryError::ForeignKeyViolation(message.conversation_id.clone())
            }
            None => MemoryError::Storage(err),
        })?;
        tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), message.conversation_id],
        )?;
        tx.commit()?;
        debug!(
            "saved message (id={}, conversation_id={}, role={}, embedded={})",
            message.id,
            message.conversation_id,
            message.role,
            message.embedding.is_some()
        );
        Ok(())
    }

    /// Total number of stored messages.
    pub fn get_message_count(&self) -> Result<usize, MemoryError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Rank every embedded message against `query` and return the best `limit`.
    ///
    /// Rows that cannot be decoded are skipped.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>, MemoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE embedding IS NOT NULL ORDER BY rowid"
        ))?;
        let rows = stmt.query_map([], message_from_row)?;
        let candidates = rows.filter_map(|row| match row {
            Ok(message) => Some(message),
            Err(err) => {
                debug!("skipping unreadable search candidate: {err}");
                None
            }
        });
        Ok(similarity::rank(query, candidates, limit))
    }

    /// Delete a conversation and, through the cascade, its messages.
    pub fn delete_conversation(&self, id: &str) -> Result<bool, MemoryError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        info!("deleted conversation (id={}, found={})", id, deleted > 0);
        Ok(deleted > 0)
    }

    /// Run a closure against the raw connection.
    #[cfg(test)]
    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock())
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        messages: Vec::new(),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let embedding: Option<Vec<u8>> = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        embedding: embedding.as_deref().map(codec::decode),
        created_at: row.get(5)?,
    })
}

/// Surface role conversion failures as `InvalidRole` rather than a raw
/// conversion error.
fn read_error(err: rusqlite::Error) -> MemoryError {
    if let rusqlite::Error::FromSqlConversionFailure(_, _, source) = &err {
        if let Some(MemoryError::InvalidRole(value)) = source.downcast_ref::<MemoryError>() {
            return MemoryError::InvalidRole(value.clone());
        }
    }
    MemoryError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::Store;
    use crate::{MemoryError, Message, Role};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn message(id: &str, conversation_id: &str, role: Role, content: &str) -> Message {
        Message::new(id, conversation_id, role, content, Utc::now())
    }

    #[test]
    fn create_conversation_rejects_duplicate_ids() {
        let store = Store::open_in_memory().expect("store");
        let created = store.create_conversation("c1", "First").expect("create");
        assert_eq!(created.created_at, created.updated_at);

        let err = store.create_conversation("c1", "Again").unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateIdentity(id) if id == "c1"));
    }

    #[test]
    fn get_conversation_is_none_for_unknown_ids() {
        let store = Store::open_in_memory().expect("store");
        assert_eq!(store.get_conversation("missing").expect("get"), None);
        assert_eq!(store.get_last_conversation().expect("last"), None);
    }

    #[test]
    fn save_message_requires_existing_conversation() {
        let store = Store::open_in_memory().expect("store");
        let err = store
            .save_message(&message("m1", "ghost", Role::User, "hi"))
            .unwrap_err();
        assert!(matches!(err, MemoryError::ForeignKeyViolation(id) if id == "ghost"));
        assert_eq!(store.get_message_count().expect("count"), 0);
    }

    #[test]
    fn save_message_rejects_duplicate_message_ids() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "t").expect("create");
        store.create_conversation("c2", "t").expect("create");
        store
            .save_message(&message("m1", "c1", Role::User, "one"))
            .expect("save");
        let err = store
            .save_message(&message("m1", "c2", Role::User, "two"))
            .unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateIdentity(id) if id == "m1"));
        assert_eq!(store.get_message_count().expect("count"), 1);
    }

    #[test]
    fn messages_come_back_in_creation_order_with_embeddings() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        let base = Utc::now();
        let later = Message::new("m2", "c1", Role::Assistant, "reply", base + Duration::seconds(5));
        let earlier = Message::new("m1", "c1", Role::User, "prompt", base)
            .with_embedding(vec![0.5, -0.25]);
        store.save_message(&later).expect("save later");
        store.save_message(&earlier).expect("save earlier");

        let conversation = store.get_conversation("c1").expect("get").expect("exists");
        assert_eq!(conversation.messages, vec![earlier, later]);
    }

    #[test]
    fn identical_timestamps_keep_insertion_order() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        let at = Utc::now();
        for id in ["a", "b", "c"] {
            store
                .save_message(&Message::new(id, "c1", Role::User, id, at))
                .expect("save");
        }
        let conversation = store.get_conversation("c1").expect("get").expect("exists");
        let ids: Vec<_> = conversation.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn saving_touches_conversation_update_time() {
        let store = Store::open_in_memory().expect("store");
        let created = store.create_conversation("c1", "Chat").expect("create");
        store
            .save_message(&message("m1", "c1", Role::User, "hi"))
            .expect("save");
        let fetched = store.get_conversation("c1").expect("get").expect("exists");
        assert!(fetched.updated_at >= created.updated_at);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[test]
    fn list_conversations_orders_by_recency() {
        let store = Store::open_in_memory().expect("store");
        for id in ["c1", "c2", "c3", "c4", "c5"] {
            store.create_conversation(id, id).expect("create");
        }
        let listed = store.list_conversations(3).expect("list");
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c5", "c4", "c3"]);
        assert!(listed.iter().all(|c| c.messages.is_empty()));

        store
            .save_message(&message("m1", "c1", Role::User, "bump"))
            .expect("save");
        let last = store.get_last_conversation().expect("last").expect("exists");
        assert_eq!(last.id, "c1");
        assert_eq!(last.messages.len(), 1);
    }

    #[test]
    fn absent_and_empty_embeddings_are_distinct() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        store
            .save_message(&message("none", "c1", Role::Assistant, "no vector"))
            .expect("save");
        store
            .save_message(&message("empty", "c1", Role::User, "empty vector").with_embedding(vec![]))
            .expect("save");

        let conversation = store.get_conversation("c1").expect("get").expect("exists");
        assert_eq!(conversation.messages[0].embedding, None);
        assert_eq!(conversation.messages[1].embedding, Some(vec![]));

        let results = store.search(&[1.0], 10).expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].message.id, "empty");
        assert_eq!(results[0].similarity, 0.0);
    }

    #[test]
    fn search_skips_unembedded_messages() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        store
            .save_message(&message("hello", "c1", Role::User, "hello").with_embedding(vec![1.0, 0.0]))
            .expect("save");
        store
            .save_message(&message("world", "c1", Role::User, "world").with_embedding(vec![0.0, 1.0]))
            .expect("save");
        store
            .save_message(&message("reply", "c1", Role::Assistant, "hi there"))
            .expect("save");

        let top = store.search(&[1.0, 0.0], 1).expect("search");
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].message.content, "hello");
        assert!((top[0].similarity - 1.0).abs() < 1e-12);

        let all = store.search(&[1.0, 0.0], 10).expect("search");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn unknown_roles_are_rejected_on_read_and_skipped_by_search() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        store
            .save_message(&message("good", "c1", Role::User, "ok").with_embedding(vec![1.0]))
            .expect("save");
        store.with_connection(|conn| {
            conn.execute_batch(
                "PRAGMA ignore_check_constraints = ON;
                 INSERT INTO messages (id, conversation_id, role, content, embedding, created_at)
                 VALUES ('bad', 'c1', 'tool', 'x', X'0000803F', '2024-01-01 00:00:00+00:00');
                 PRAGMA ignore_check_constraints = OFF;",
            )
            .expect("raw insert");
        });

        let results = store.search(&[1.0], 10).expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].message.id, "good");

        let err = store.get_conversation("c1").unwrap_err();
        assert!(matches!(err, MemoryError::InvalidRole(role) if role == "tool"));
    }

    #[test]
    fn deleting_a_conversation_cascades() {
        let store = Store::open_in_memory().expect("store");
        store.create_conversation("c1", "Chat").expect("create");
        store
            .save_message(&message("m1", "c1", Role::User, "hi"))
            .expect("save");
        assert!(store.delete_conversation("c1").expect("delete"));
        assert_eq!(store.get_message_count().expect("count"), 0);
        assert!(!store.delete_conversation("c1").expect("delete again"));
    }

    #[test]
    fn data_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("memory.db");
        let store = Store::open(&path).expect("open");
        store.create_conversation("c1", "Persisted").expect("create");
        store
            .save_message(&message("m1", "c1", Role::User, "hi").with_embedding(vec![f32::NAN]))
            .expect("save");
        store.close().expect("close");

        let reopened = Store::open(&path).expect("reopen");
        let conversation = reopened.get_conversation("c1").expect("get").expect("exists");
        assert_eq!(conversation.title, "Persisted");
        let embedding = conversation.messages[0].embedding.clone().expect("embedding");
        assert_eq!(embedding[0].to_bits(), f32::NAN.to_bits());
    }
}
