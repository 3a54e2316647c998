//! Application state for the dvkcli TUI.

use crate::theme::Theme;
use chrono::{DateTime, Local, Utc};
use dvkcli_memory::{
    Conversation, DEFAULT_TITLE_CHARS, Message, Role, SearchResult, derive_title,
};
use dvkcli_ollama::{ChatMessage, ModelInfo};
use log::{debug, info};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use std::cmp::min;
use std::fmt::Write as _;
use uuid::Uuid;

/// Frames of the "thinking" indicator.
const TYPING_FRAMES: [&str; 4] = ["●○○", "○●○", "○○●", "○●○"];
/// Characters of a memory shown in `/search` output.
const PREVIEW_CHARS: usize = 80;

/// Single entry rendered in the transcript.
///
/// `Role::System` entries are local notes (command output, errors); they are
/// never sent to the model or stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Messages of one turn, ready to hand to the memory façade.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordJob {
    pub conversation_id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

/// Reply currently being generated.
#[derive(Debug, Clone)]
pub struct ActiveStream {
    pub id: u64,
    pub content: String,
    conversation_id: String,
    title: String,
    prompt: ChatEntry,
}

/// Top-level application state for the TUI.
pub struct App {
    /// Conversation new turns are recorded into.
    pub conversation_id: String,
    /// Transcript entries.
    pub messages: Vec<ChatEntry>,
    /// Current input buffer.
    pub input: String,
    /// Chat model shown in the header.
    pub model: String,
    /// Last connection probe result.
    pub connected: bool,
    /// Whether a memory store is attached.
    pub memory_enabled: bool,
    pub memory_count: usize,
    pub status: String,
    pub show_slash_commands: bool,
    pub stream: Option<ActiveStream>,
    pub scroll: u16,
    pub auto_scroll: bool,
    pub chat_max_scroll: u16,
    pub typing_frame: usize,
    pub theme: Theme,
    next_stream_id: u64,
}

impl App {
    pub fn new(model: impl Into<String>, memory_enabled: bool, theme: Theme) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            input: String::new(),
            model: model.into(),
            connected: false,
            memory_enabled,
            memory_count: 0,
            status: "idle".to_string(),
            show_slash_commands: false,
            stream: None,
            scroll: 0,
            auto_scroll: true,
            chat_max_scroll: 0,
            typing_frame: 0,
            theme,
            next_stream_id: 0,
        }
    }

    /// Start a fresh conversation with an empty transcript.
    pub fn new_conversation(&mut self) {
        self.conversation_id = Uuid::new_v4().to_string();
        info!("new conversation (id={})", self.conversation_id);
        self.messages.clear();
        self.reset_scroll();
        self.status = "idle".to_string();
    }

    /// Replace the transcript with a stored conversation and continue it.
    pub fn load_conversation(&mut self, conversation: Conversation) {
        debug!(
            "loading conversation (id={}, messages={})",
            conversation.id,
            conversation.messages.len()
        );
        self.conversation_id = conversation.id;
        self.messages = conversation
            .messages
            .into_iter()
            .filter_map(|message| match message.role {
                Role::User | Role::Assistant => Some(ChatEntry {
                    role: message.role,
                    content: message.content,
                    created_at: message.created_at,
                }),
                // System entries in the transcript are local notes.
                Role::System => {
                    debug!("skipping stored system message (id={})", message.id);
                    None
                }
            })
            .collect();
        self.reset_scroll();
        self.status = "conversation loaded".to_string();
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Append a local note to the transcript.
    pub fn push_note(&mut self, content: impl Into<String>) {
        self.messages.push(ChatEntry::new(Role::System, content));
        self.maybe_enable_auto_scroll();
    }

    /// Add the prompt to the transcript and open a stream for its reply.
    pub fn begin_turn(&mut self, prompt: String) -> u64 {
        let entry = ChatEntry::new(Role::User, prompt);
        self.messages.push(entry.clone());
        let title = self
            .messages
            .iter()
            .find(|entry| entry.role == Role::User)
            .map(|entry| derive_title(&entry.content, DEFAULT_TITLE_CHARS))
            .unwrap_or_default();
        self.next_stream_id += 1;
        let id = self.next_stream_id;
        self.stream = Some(ActiveStream {
            id,
            content: String::new(),
            conversation_id: self.conversation_id.clone(),
            title,
            prompt: entry,
        });
        self.status = "thinking".to_string();
        self.enable_auto_scroll();
        id
    }

    /// Apply a delta of stream `id`; stale streams are ignored.
    pub fn append_delta(&mut self, id: u64, delta: &str) -> bool {
        match self.stream.as_mut() {
            Some(stream) if stream.id == id => {
                stream.content.push_str(delta);
                self.maybe_enable_auto_scroll();
                true
            }
            _ => false,
        }
    }

    /// Close stream `id` with the final reply and return the turn to record.
    ///
    /// An empty reply records the prompt alone.
    pub fn finish_stream(&mut self, id: u64, content: String) -> Option<RecordJob> {
        let stream = self.take_stream(id)?;
        self.status = "idle".to_string();
        let mut messages = vec![to_message(&stream.conversation_id, &stream.prompt)];
        if content.trim().is_empty() {
            self.push_note("No response from the model. It might still be loading.");
        } else {
            let reply = ChatEntry::new(Role::Assistant, content);
            messages.push(to_message(&stream.conversation_id, &reply));
            self.messages.push(reply);
            self.maybe_enable_auto_scroll();
        }
        Some(RecordJob {
            conversation_id: stream.conversation_id,
            title: stream.title,
            messages,
        })
    }

    /// Close stream `id` after an error; the prompt is still recorded.
    pub fn fail_stream(&mut self, id: u64, reason: &str) -> Option<RecordJob> {
        let stream = self.take_stream(id)?;
        self.status = "idle".to_string();
        self.push_note(format!("Error: {reason}"));
        Some(RecordJob {
            messages: vec![to_message(&stream.conversation_id, &stream.prompt)],
            conversation_id: stream.conversation_id,
            title: stream.title,
        })
    }

    /// Stop the active stream, discarding the partial reply.
    pub fn cancel_stream(&mut self) -> Option<RecordJob> {
        let id = self.stream.as_ref()?.id;
        let job = self.fail_stream(id, "generation stopped");
        self.status = "stopped".to_string();
        job
    }

    fn take_stream(&mut self, id: u64) -> Option<ActiveStream> {
        if self.stream.as_ref().is_some_and(|stream| stream.id == id) {
            self.stream.take()
        } else {
            debug!("ignoring stale stream event (id={})", id);
            None
        }
    }

    /// Conversation so far in model request form, led by `system_prompt`.
    pub fn chat_history(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut history = Vec::with_capacity(self.messages.len() + 1);
        if !system_prompt.trim().is_empty() {
            history.push(ChatMessage::system(system_prompt));
        }
        history.extend(
            self.messages
                .iter()
                .filter(|entry| entry.role != Role::System)
                .map(|entry| ChatMessage::new(entry.role, entry.content.clone())),
        );
        history
    }

    /// Advance the thinking indicator.
    pub fn tick(&mut self) {
        if self.is_streaming() {
            self.typing_frame = (self.typing_frame + 1) % TYPING_FRAMES.len();
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = min(self.scroll.saturating_add(lines), self.chat_max_scroll);
        if self.scroll >= self.chat_max_scroll {
            self.auto_scroll = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.auto_scroll = false;
        self.scroll = 0;
    }

    pub fn enable_auto_scroll(&mut self) {
        self.auto_scroll = true;
        self.scroll = self.chat_max_scroll;
    }

    /// Update scroll bounds after layout changes.
    ///
    /// Snaps to the new bottom only when auto-scroll is on or the view was
    /// already at the bottom.
    pub fn update_scroll_bounds(&mut self, max_scroll: u16) {
        let was_at_bottom = self.scroll >= self.chat_max_scroll;
        self.chat_max_scroll = max_scroll;
        if self.auto_scroll || was_at_bottom {
            self.scroll = max_scroll;
            self.auto_scroll = true;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn maybe_enable_auto_scroll(&mut self) {
        if self.auto_scroll {
            self.scroll = self.chat_max_scroll;
        }
    }

    fn reset_scroll(&mut self) {
        self.scroll = 0;
        self.auto_scroll = true;
        self.chat_max_scroll = 0;
    }

    /// Render the transcript into styled lines.
    pub fn render_lines(&self) -> Vec<Line<'static>> {
        let theme = self.theme;
        let mut lines = Vec::new();

        if self.messages.is_empty() && self.stream.is_none() {
            lines.push(Line::from(Span::styled(
                " Ready when you are. Type a message below, or /help for commands.",
                Style::default()
                    .fg(theme.secondary)
                    .add_modifier(Modifier::ITALIC),
            )));
            return lines;
        }

        for entry in &self.messages {
            let (label, color) = match entry.role {
                Role::User => ("▸ You", theme.accent),
                Role::Assistant => ("◆ Assistant", theme.text),
                Role::System => ("◇ System", theme.muted),
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {label} "),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    entry
                        .created_at
                        .with_timezone(&Local)
                        .format("%H:%M")
                        .to_string(),
                    Style::default().fg(theme.border),
                ),
            ]));
            let content_style = match entry.role {
                Role::System => Style::default()
                    .fg(theme.muted)
                    .add_modifier(Modifier::ITALIC),
                _ => Style::default().fg(theme.text),
            };
            for line in entry.content.lines() {
                lines.push(Line::from(Span::styled(format!(" {line}"), content_style)));
            }
            lines.push(Line::from(Span::raw("")));
        }

        if let Some(stream) = &self.stream {
            if stream.content.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!(" {} thinking...", TYPING_FRAMES[self.typing_frame]),
                    Style::default().fg(theme.primary),
                )));
            } else {
                lines.push(Line::from(Span::styled(
                    " ◆ Assistant ",
                    Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
                )));
                let mut body: Vec<&str> = stream.content.lines().collect();
                if stream.content.ends_with('\n') {
                    body.push("");
                }
                let last = body.len().saturating_sub(1);
                for (idx, line) in body.iter().enumerate() {
                    let mut spans = vec![Span::styled(
                        format!(" {line}"),
                        Style::default().fg(theme.text),
                    )];
                    if idx == last {
                        spans.push(Span::styled("▌", Style::default().fg(theme.secondary)));
                    }
                    lines.push(Line::from(spans));
                }
            }
        }

        lines.push(Line::from(Span::raw("")));
        lines
    }
}

fn to_message(conversation_id: &str, entry: &ChatEntry) -> Message {
    Message::new(
        Uuid::new_v4().to_string(),
        conversation_id,
        entry.role,
        entry.content.clone(),
        entry.created_at,
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Note text for `/search` results.
pub fn format_search_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No matching conversations found for \"{query}\".");
    }
    let mut out = format!("Found {} relevant messages:\n\n", results.len());
    for (idx, result) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{:.0}% match] {}",
            idx + 1,
            result.similarity * 100.0,
            preview(&result.message.content, PREVIEW_CHARS)
        );
    }
    out.trim_end().to_string()
}

/// Note text for `/models`.
pub fn format_models(models: &[ModelInfo], current: &str) -> String {
    if models.is_empty() {
        return "No models installed on the server.".to_string();
    }
    let mut out = String::from("Available models:\n\n");
    for (idx, model) in models.iter().enumerate() {
        let marker = if model.name == current { "► " } else { "  " };
        let _ = writeln!(out, "{marker}{}. {}", idx + 1, model.name);
    }
    let _ = write!(out, "\nCurrent model: {current}");
    out
}

/// Note text for `/history`.
pub fn format_history(conversations: &[Conversation]) -> String {
    if conversations.is_empty() {
        return "No stored conversations yet.".to_string();
    }
    let mut out = String::from("Recent conversations:\n\n");
    for (idx, conversation) in conversations.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}  ({})",
            idx + 1,
            conversation.title,
            conversation
                .updated_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        );
    }
    out.push_str("\nCtrl+L resumes the most recent one.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::new("qwen2.5:3b", true, Theme::default())
    }

    #[test]
    fn completed_turn_records_prompt_and_reply() {
        let mut app = app();
        let conversation_id = app.conversation_id.clone();
        let id = app.begin_turn("what is rust?".to_string());
        assert!(app.is_streaming());
        assert!(app.append_delta(id, "A systems "));
        assert!(app.append_delta(id, "language."));
        assert_eq!(app.stream.as_ref().map(|s| s.content.as_str()), Some("A systems language."));

        let job = app
            .finish_stream(id, "A systems language.".to_string())
            .expect("job");
        assert!(!app.is_streaming());
        assert_eq!(job.conversation_id, conversation_id);
        assert_eq!(job.title, "what is rust?");
        let roles: Vec<Role> = job.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert!(job.messages.iter().all(|m| m.conversation_id == conversation_id));
        assert_ne!(job.messages[0].id, job.messages[1].id);
        assert_eq!(app.messages.len(), 2);
    }

    #[test]
    fn failed_turn_records_prompt_alone() {
        let mut app = app();
        let id = app.begin_turn("hello".to_string());
        let job = app.fail_stream(id, "connection refused").expect("job");
        assert_eq!(job.messages.len(), 1);
        assert_eq!(job.messages[0].content, "hello");
        assert_eq!(app.messages.last().map(|e| e.role), Some(Role::System));
    }

    #[test]
    fn cancelled_turn_discards_partial_reply() {
        let mut app = app();
        let id = app.begin_turn("long question".to_string());
        app.append_delta(id, "partial");
        let job = app.cancel_stream().expect("job");
        assert_eq!(job.messages.len(), 1);
        assert!(app.messages.iter().all(|e| e.content != "partial"));
        assert!(app.cancel_stream().is_none());
    }

    #[test]
    fn empty_reply_records_prompt_alone() {
        let mut app = app();
        let id = app.begin_turn("hi".to_string());
        let job = app.finish_stream(id, "  ".to_string()).expect("job");
        assert_eq!(job.messages.len(), 1);
    }

    #[test]
    fn stale_stream_events_are_ignored() {
        let mut app = app();
        let first = app.begin_turn("one".to_string());
        app.cancel_stream();
        let second = app.begin_turn("two".to_string());
        assert_ne!(first, second);
        assert!(!app.append_delta(first, "late"));
        assert!(app.finish_stream(first, "late".to_string()).is_none());
        assert!(app.is_streaming());
    }

    /// The title comes from the conversation's first prompt.
    #[test]
    fn title_uses_first_prompt() {
        let mut app = app();
        let long = "x".repeat(80);
        let id = app.begin_turn(long);
        let job = app.finish_stream(id, "ok".to_string()).expect("job");
        assert_eq!(job.title.chars().count(), DEFAULT_TITLE_CHARS);
        assert!(job.title.ends_with("..."));

        let id = app.begin_turn("second".to_string());
        let job = app.finish_stream(id, "ok".to_string()).expect("job");
        assert_eq!(job.title, format!("{}...", "x".repeat(DEFAULT_TITLE_CHARS - 3)));
    }

    #[test]
    fn history_skips_notes_and_leads_with_system_prompt() {
        let mut app = app();
        app.push_note("/help output");
        let id = app.begin_turn("hi".to_string());
        app.finish_stream(id, "hello".to_string());
        app.begin_turn("and now?".to_string());

        let history = app.chat_history("be brief");
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(history[0].content, "be brief");
        assert_eq!(app.chat_history("").len(), 3);
    }

    #[test]
    fn loading_a_conversation_continues_it() {
        let mut app = app();
        app.push_note("old note");
        let now = Utc::now();
        let conversation = Conversation {
            id: "chat-7".to_string(),
            title: "t".to_string(),
            created_at: now,
            updated_at: now,
            messages: vec![
                Message::new("m1", "chat-7", Role::User, "q", now),
                Message::new("m2", "chat-7", Role::Assistant, "a", now),
            ],
        };
        app.load_conversation(conversation);
        assert_eq!(app.conversation_id, "chat-7");
        assert_eq!(app.messages.len(), 2);

        let id = app.begin_turn("follow-up".to_string());
        let job = app.finish_stream(id, "sure".to_string()).expect("job");
        assert_eq!(job.conversation_id, "chat-7");
        assert_eq!(job.title, "q");
    }

    #[test]
    fn loading_skips_stored_system_rows() {
        let mut app = app();
        let now = Utc::now();
        let conversation = Conversation {
            id: "chat-8".to_string(),
            title: "t".to_string(),
            created_at: now,
            updated_at: now,
            messages: vec![
                Message::new("m1", "chat-8", Role::System, "be brief", now),
                Message::new("m2", "chat-8", Role::User, "q", now),
                Message::new("m3", "chat-8", Role::Assistant, "a", now),
            ],
        };
        app.load_conversation(conversation);

        let roles: Vec<Role> = app.messages.iter().map(|entry| entry.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(app.chat_history("").len(), 2);
    }

    #[test]
    fn new_conversation_resets_transcript() {
        let mut app = app();
        let before = app.conversation_id.clone();
        app.push_note("x");
        app.new_conversation();
        assert!(app.messages.is_empty());
        assert_ne!(app.conversation_id, before);
    }

    #[test]
    fn scrolling_respects_bounds() {
        let mut app = app();
        app.update_scroll_bounds(20);
        assert_eq!(app.scroll, 20);
        app.scroll_up(5);
        assert!(!app.auto_scroll);
        app.update_scroll_bounds(30);
        assert_eq!(app.scroll, 15);
        app.scroll_down(100);
        assert_eq!(app.scroll, 30);
        assert!(app.auto_scroll);
    }

    #[test]
    fn search_results_are_listed_as_percentages() {
        let now = Utc::now();
        let results = vec![SearchResult {
            message: Message::new("m1", "c", Role::User, "how do lifetimes work", now),
            similarity: 0.873,
        }];
        assert_eq!(
            format_search_results("lifetimes", &results),
            "Found 1 relevant messages:\n\n1. [87% match] how do lifetimes work"
        );
        assert!(format_search_results("x", &[]).starts_with("No matching"));
    }

    #[test]
    fn models_mark_the_current_one() {
        let models = vec![
            ModelInfo {
                name: "qwen2.5:3b".to_string(),
                size: 0,
                modified_at: String::new(),
            },
            ModelInfo {
                name: "llama3.2".to_string(),
                size: 0,
                modified_at: String::new(),
            },
        ];
        let text = format_models(&models, "llama3.2");
        assert!(text.contains("  1. qwen2.5:3b"));
        assert!(text.contains("► 2. llama3.2"));
        assert!(text.ends_with("Current model: llama3.2"));
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\nb   c", 80), "a b c");
        assert_eq!(preview("abcdefghij", 6), "abc...");
    }
}
