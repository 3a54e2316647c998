//! Conversation memory for dvkcli: SQLite persistence of chat turns with
//! embedding vectors and similarity-ranked recall.

pub mod codec;
pub mod error;
pub mod facade;
pub mod model;
pub mod provider;
pub mod similarity;
pub mod store;

/// Memory error type.
pub use error::MemoryError;
/// Display-layer façade and turn bookkeeping.
pub use facade::{DEFAULT_TITLE_CHARS, Memory, TurnReport, derive_title};
/// Conversation and message models.
pub use model::{Conversation, Message, Role, SearchResult};
/// Embedding capability interface.
pub use provider::EmbeddingProvider;
/// SQLite store.
pub use store::Store;
