//! HTTP client for an Ollama model server: chat (streamed or whole),
//! embeddings, and model listing.

mod client;
mod error;
mod stream;
mod types;

pub use client::{CLOUD_MODEL, CLOUD_URL, LOCAL_URL, OllamaClient};
pub use error::OllamaError;
pub use stream::NdjsonDecoder;
pub use types::{ChatChunk, ChatMessage, ModelInfo};
