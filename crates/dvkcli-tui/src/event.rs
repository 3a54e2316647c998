//! TUI event types for input and background task results.

use crossterm::event::KeyEvent;
use dvkcli_memory::{Conversation, SearchResult};
use dvkcli_ollama::ModelInfo;

/// Application event emitted by input handlers or background tasks.
#[derive(Debug)]
pub enum AppEvent {
    /// Keyboard input event.
    Input(KeyEvent),
    /// Periodic tick event.
    Tick,
    /// Scroll event in the chat view.
    Scroll(i16),
    /// Text appended to the reply of stream `id`.
    StreamDelta { id: u64, delta: String },
    /// Stream `id` finished with the full reply.
    StreamDone { id: u64, content: String },
    /// Stream `id` failed before finishing.
    StreamFailed { id: u64, error: String },
    /// Result of a connection probe.
    Connection(bool),
    /// Stored message count.
    MemoryCount(usize),
    /// A turn could not be stored completely.
    RecordFailed(String),
    /// Result of `/search`.
    Recall {
        query: String,
        results: Result<Vec<SearchResult>, String>,
    },
    /// Result of `/history`.
    History(Result<Vec<Conversation>, String>),
    /// Result of loading the last conversation.
    LastConversation(Result<Option<Conversation>, String>),
    /// Result of `/models`.
    Models(Result<Vec<ModelInfo>, String>),
}
