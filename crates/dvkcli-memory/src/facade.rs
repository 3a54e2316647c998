//! Memory façade used by the display layer.
//!
//! Composes the store and the similarity engine behind a small operation set
//! and owns the lazy conversation-creation policy.

use crate::error::MemoryError;
use crate::model::{Conversation, Message, Role, SearchResult};
use crate::provider::EmbeddingProvider;
use crate::store::Store;
use log::{debug, info, warn};
use std::path::Path;

/// Default maximum title length, in characters.
pub const DEFAULT_TITLE_CHARS: usize = 50;
/// Title used when the first prompt is blank.
const FALLBACK_TITLE: &str = "New Chat";

/// Outcome of recording one turn.
#[derive(Debug, Default)]
pub struct TurnReport {
    /// Whether this turn created the conversation.
    pub conversation_created: bool,
    /// Ids of messages that were stored, in order.
    pub saved: Vec<String>,
    /// Number of stored messages that carry an embedding.
    pub embedded: usize,
    /// Messages that could not be stored, with the reason.
    pub failures: Vec<(String, MemoryError)>,
}

impl TurnReport {
    /// True when every message of the turn was stored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Conversation memory owning the store handle.
///
/// Store calls are synchronous. `record_turn` and `recall` run them inline
/// between awaits and never hold the lock across one; callers on an async
/// runtime should move the purely synchronous reads to `spawn_blocking`.
pub struct Memory {
    store: Store,
}

impl Memory {
    /// Wrap an opened store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Open the store at `path` and wrap it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Ok(Self::new(Store::open(path)?))
    }

    /// Release the underlying store.
    pub fn close(self) -> Result<(), MemoryError> {
        self.store.close()
    }

    /// Persist one turn into `conversation_id`, creating the conversation
    /// with `title` on first use.
    ///
    /// Messages are stored in order, each independently: a failed save is
    /// recorded in the report and the remaining messages are still attempted.
    /// User messages without an embedding get one from `embedder` when it can
    /// produce one. Only a failure to create the missing conversation aborts.
    pub async fn record_turn(
        &self,
        conversation_id: &str,
        title: &str,
        messages: Vec<Message>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<TurnReport, MemoryError> {
        let mut report = TurnReport::default();
        match self.store.create_conversation(conversation_id, title) {
            Ok(_) => {
                info!("conversation created (id={})", conversation_id);
                report.conversation_created = true;
            }
            Err(MemoryError::DuplicateIdentity(_)) => {}
            Err(err) => return Err(err),
        }

        for mut message in messages {
            message.conversation_id = conversation_id.to_string();
            if message.role == Role::User && message.embedding.is_none() {
                match embed_text(embedder, &message.content).await {
                    Ok(embedding) => message.embedding = Some(embedding),
                    Err(err) => warn!(
                        "saving message without embedding (id={}): {err}",
                        message.id
                    ),
                }
            }
            match self.store.save_message(&message) {
                Ok(()) => {
                    if message.embedding.is_some() {
                        report.embedded += 1;
                    }
                    report.saved.push(message.id);
                }
                Err(err) => {
                    warn!("failed to save message (id={}): {err}", message.id);
                    report.failures.push((message.id, err));
                }
            }
        }
        debug!(
            "turn recorded (conversation_id={}, saved={}, embedded={}, failed={})",
            conversation_id,
            report.saved.len(),
            report.embedded,
            report.failures.len()
        );
        Ok(report)
    }

    /// Semantic search over stored prompts.
    ///
    /// Fails with `EmbeddingUnavailable` before touching the store when the
    /// query cannot be embedded.
    pub async fn recall(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
        limit: usize,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        let embedding = embed_text(embedder, query).await?;
        let results = self.store.search(&embedding, limit)?;
        debug!(
            "recall finished (query_len={}, limit={}, returned={})",
            query.len(),
            limit,
            results.len()
        );
        Ok(results)
    }

    /// Number of stored messages.
    pub fn count(&self) -> Result<usize, MemoryError> {
        self.store.get_message_count()
    }

    /// Most recently updated conversation with its messages.
    pub fn last_conversation(&self) -> Result<Option<Conversation>, MemoryError> {
        self.store.get_last_conversation()
    }

    /// A conversation with its messages.
    pub fn conversation(&self, id: &str) -> Result<Option<Conversation>, MemoryError> {
        self.store.get_conversation(id)
    }

    /// Recently updated conversation summaries, newest first.
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<Conversation>, MemoryError> {
        self.store.list_conversations(limit)
    }
}

/// Ask the provider for an embedding, folding every failure mode into
/// `EmbeddingUnavailable`.
async fn embed_text(
    embedder: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, MemoryError> {
    match embedder.embed(text).await {
        Ok(embedding) if embedding.is_empty() => Err(MemoryError::EmbeddingUnavailable(
            "provider returned an empty embedding".to_string(),
        )),
        Ok(embedding) => Ok(embedding),
        Err(err @ MemoryError::EmbeddingUnavailable(_)) => Err(err),
        Err(err) => Err(MemoryError::EmbeddingUnavailable(err.to_string())),
    }
}

/// Conversation title from the first prompt, cut at `max_chars` characters
/// with a trailing ellipsis.
pub fn derive_title(text: &str, max_chars: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(3);
    let mut title: String = text.chars().take(keep).collect();
    title.push_str("...");
    title
}

#[cfg(test)]
mod tests {
    use super::{Memory, derive_title};
    use crate::{EmbeddingProvider, MemoryError, Store};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Unreachable;

    #[async_trait]
    impl EmbeddingProvider for Unreachable {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
            Err(MemoryError::Io(std::io::Error::other("connection refused")))
        }
    }

    #[tokio::test]
    async fn recall_without_embedding_never_scans() {
        let store = Store::open_in_memory().expect("store");
        // A scan would now fail with a storage error instead.
        store.with_connection(|conn| {
            conn.execute_batch("DROP TABLE messages;").expect("drop");
        });
        let memory = Memory::new(store);

        let err = memory.recall("anything", &Unreachable, 5).await.unwrap_err();
        assert!(
            matches!(&err, MemoryError::EmbeddingUnavailable(reason) if reason.contains("connection refused")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn derive_title_truncates_on_char_boundaries() {
        assert_eq!(derive_title("  hello   world ", 50), "hello world");
        assert_eq!(derive_title("", 50), "New Chat");
        assert_eq!(derive_title("abcdefghij", 8), "abcde...");
        assert_eq!(derive_title("ééééééééé", 6), "ééé...");
    }
}
