use chrono::Utc;
use dvkcli_memory::{Message, Role};
use uuid::Uuid;

/// Unsaved user message with a fresh id.
pub fn user_message(conversation_id: &str, content: &str) -> Message {
    Message::new(
        Uuid::new_v4().to_string(),
        conversation_id,
        Role::User,
        content,
        Utc::now(),
    )
}

/// Unsaved assistant message with a fresh id.
pub fn assistant_message(conversation_id: &str, content: &str) -> Message {
    Message::new(
        Uuid::new_v4().to_string(),
        conversation_id,
        Role::Assistant,
        content,
        Utc::now(),
    )
}
