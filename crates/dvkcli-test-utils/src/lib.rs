//! Test helpers shared across dvkcli crates.

pub mod embedder;
pub mod messages;

pub use embedder::{FailingEmbedder, FixedEmbedder, RecordingEmbedder};
pub use messages::{assistant_message, user_message};
