//! Embedding capability consumed by the memory façade.

use crate::error::MemoryError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
/// Turns text into a fixed-length vector.
///
/// Implementations report failures as [`MemoryError::EmbeddingUnavailable`];
/// the façade treats any error, and any empty vector, as "no embedding".
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        (**self).embed(text).await
    }
}
