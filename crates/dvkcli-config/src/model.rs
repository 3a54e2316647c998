//! Configuration schema for dvkcli.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default local model server.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default chat model.
pub const DEFAULT_MODEL: &str = "qwen2.5:3b";
/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
/// Default number of memories surfaced by recall.
pub const DEFAULT_CONTEXT_LIMIT: usize = 5;
/// Default colour theme.
pub const DEFAULT_THEME: &str = "wine";
/// Default system prompt sent ahead of every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and capable assistant running in a \
terminal. You can write code, explain concepts, help with work tasks and hold a conversation. \
Be concise but thorough, and use markdown code blocks when writing code.";

/// Root config for the dvkcli client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DvkConfig {
    /// Base URL of the model server.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Chat model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Embedding model name.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Record turns and allow recall.
    #[serde(default = "default_true")]
    pub memory_enabled: bool,
    /// How many memories `/search` returns.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Database location override; `~/.dvkcli/memory.db` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<PathBuf>,
}

impl Default for DvkConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
            embed_model: default_embed_model(),
            system_prompt: default_system_prompt(),
            memory_enabled: true,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            theme: default_theme(),
            memory_path: None,
        }
    }
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_embed_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_context_limit() -> usize {
    DEFAULT_CONTEXT_LIMIT
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}
