use async_trait::async_trait;
use dvkcli_memory::{EmbeddingProvider, MemoryError};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Returns canned vectors per text, or a fallback vector.
#[derive(Debug, Clone, Default)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every text to the same vector.
    pub fn constant(vector: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback: Some(vector),
        }
    }

    /// Register the vector returned for `text`.
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| MemoryError::EmbeddingUnavailable(format!("no vector for {text:?}")))
    }
}

/// Always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
        Err(MemoryError::EmbeddingUnavailable(
            "embedding model offline".to_string(),
        ))
    }
}

/// Wraps another provider and records every text it was asked to embed.
pub struct RecordingEmbedder<E> {
    inner: E,
    calls: Mutex<Vec<String>>,
}

impl<E> RecordingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for RecordingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.lock().push(text.to_string());
        self.inner.embed(text).await
    }
}
