//! Error types for the model server client.

use thiserror::Error;

/// Errors returned by [`crate::OllamaClient`].
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Transport or HTTP layer failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    /// The server reported an error inside a streamed response.
    #[error("model server error: {0}")]
    Server(String),
    /// A response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    /// `/api/embed` returned no vectors.
    #[error("no embeddings returned")]
    EmptyEmbedding,
    /// The configured base URL is unusable.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}
