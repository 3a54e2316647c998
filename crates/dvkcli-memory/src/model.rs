//! Conversation and message models persisted by the store.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Prompt typed by the user.
    User,
    /// Reply produced by the model.
    Assistant,
    /// Instruction or status text.
    System,
}

impl Role {
    /// Storage and wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MemoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(MemoryError::InvalidRole(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// A single stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique message id.
    pub id: String,
    /// Owning conversation id.
    pub conversation_id: String,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Embedding of the content, present for embedded user prompts.
    pub embedding: Option<Vec<f32>>,
    /// Creation time; orders messages inside a conversation.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message without an embedding.
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            embedding: None,
            created_at,
        }
    }

    /// Attach an embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A titled conversation and, when fully fetched, its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last message append.
    pub updated_at: DateTime<Utc>,
    /// Messages in chronological order; empty for summaries.
    pub messages: Vec<Message>,
}

/// A stored message scored against a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Matched message.
    pub message: Message,
    /// Cosine similarity to the query.
    pub similarity: f64,
}
