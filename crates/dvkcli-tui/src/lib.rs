//! Terminal chat client for a local model server, with conversation memory.
//!
//! [`run`] owns the terminal for the lifetime of the session: it draws the
//! UI, dispatches key presses and slash commands, and spawns background tasks
//! for streaming replies and memory bookkeeping.

mod app;
mod commands;
mod event;
mod export;
mod tasks;
mod theme;
mod ui;

pub use theme::Theme;

use anyhow::Context;
use app::{App, RecordJob, format_history, format_models, format_search_results};
use commands::{HELP_TEXT, SlashCommand, parse_slash_command};
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use dvkcli_config::DvkConfig;
use dvkcli_memory::Memory;
use dvkcli_ollama::OllamaClient;
use event::AppEvent;
use log::{debug, info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Lines moved per Up/Down press.
const LINE_SCROLL: u16 = 3;
/// Lines moved per PageUp/PageDown press.
const PAGE_SCROLL: u16 = 10;

/// Everything a session needs, assembled by the binary.
pub struct Session {
    /// Effective config; `model` is updated by `/model`.
    pub config: DvkConfig,
    pub client: Arc<OllamaClient>,
    /// `None` when memory is disabled or the store failed to open.
    pub memory: Option<Arc<Memory>>,
    /// Messages shown in the transcript on startup.
    pub notices: Vec<String>,
}

/// Shared handles used by event handlers.
struct Runtime {
    config: DvkConfig,
    client: Arc<OllamaClient>,
    memory: Option<Arc<Memory>>,
    sender: mpsc::Sender<AppEvent>,
    stream: Option<JoinHandle<()>>,
    /// Saves and reads holding the store; drained before shutdown.
    memory_tasks: JoinSet<()>,
    export_dir: PathBuf,
}

/// Run the TUI until the user quits and return the final config.
///
/// Every turn save started during the session, including the one for a reply
/// interrupted by quitting, has finished when this returns, on success and
/// error alike. The caller still owns closing the store.
pub async fn run(session: Session) -> anyhow::Result<DvkConfig> {
    let Session {
        config,
        client,
        memory,
        notices,
    } = session;

    let mut app = App::new(
        client.model(),
        memory.is_some(),
        Theme::named(&config.theme),
    );
    for notice in notices {
        app.push_note(notice);
    }

    let (tx, mut rx) = mpsc::channel(256);
    let mut runtime = Runtime {
        config,
        client,
        memory,
        sender: tx.clone(),
        stream: None,
        memory_tasks: JoinSet::new(),
        export_dir: std::env::current_dir().context("failed to resolve working directory")?,
    };

    let result = drive(&mut app, &mut runtime, tx, &mut rx).await;
    // Pending sends fail fast once nothing reads events.
    drop(rx);
    finish_session(&mut app, &mut runtime).await;
    result.map(|()| runtime.config)
}

/// Close the store once the session no longer shares it.
///
/// Fails when another handle is still alive; the store then closes on its
/// last drop instead.
pub fn close_memory(memory: Arc<Memory>) -> anyhow::Result<()> {
    let memory = Arc::try_unwrap(memory).map_err(|shared| {
        anyhow::anyhow!(
            "memory still in use at shutdown (handles={})",
            Arc::strong_count(&shared)
        )
    })?;
    memory.close().context("failed to close memory")?;
    info!("memory closed");
    Ok(())
}

/// Own the terminal for the interactive part of the session.
async fn drive(
    app: &mut App,
    runtime: &mut Runtime,
    tx: mpsc::Sender<AppEvent>,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> anyhow::Result<()> {
    let mut terminal = setup_terminal()?;
    tasks::spawn_input_handler(tx.clone());
    tasks::spawn_tick(tx.clone());
    tasks::spawn_connection_check(runtime.client.clone(), tx.clone());
    if let Some(memory) = runtime.memory.clone() {
        tasks::spawn_memory_count(&mut runtime.memory_tasks, memory, tx);
    }
    let result = event_loop(&mut terminal, app, runtime, rx).await;
    let restored = restore_terminal(&mut terminal);
    result.and(restored)
}

/// Record a reply cut off by quitting, then wait for every pending save.
async fn finish_session(app: &mut App, runtime: &mut Runtime) {
    stop_stream(app, runtime);
    tasks::drain(&mut runtime.memory_tasks).await;
    info!("session finished (conversation_id={})", app.conversation_id);
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    runtime: &mut Runtime,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;
        let Some(event) = rx.recv().await else {
            return Ok(());
        };
        if handle_app_event(event, app, runtime)? {
            return Ok(());
        }
    }
}

/// Dispatch a UI event and return true when the app should exit.
fn handle_app_event(
    event: AppEvent,
    app: &mut App,
    runtime: &mut Runtime,
) -> anyhow::Result<bool> {
    match event {
        AppEvent::Input(key) => return handle_input(key, app, runtime),
        AppEvent::Tick => app.tick(),
        AppEvent::Scroll(delta) => {
            if delta < 0 {
                app.scroll_up(delta.unsigned_abs());
            } else {
                app.scroll_down(delta as u16);
            }
        }
        AppEvent::StreamDelta { id, delta } => {
            app.append_delta(id, &delta);
        }
        AppEvent::StreamDone { id, content } => {
            if let Some(job) = app.finish_stream(id, content) {
                runtime.stream = None;
                record(runtime, job);
            }
        }
        AppEvent::StreamFailed { id, error } => {
            if let Some(job) = app.fail_stream(id, &error) {
                warn!("reply stream failed (id={}): {}", id, error);
                runtime.stream = None;
                record(runtime, job);
                tasks::spawn_connection_check(runtime.client.clone(), runtime.sender.clone());
            }
        }
        AppEvent::Connection(connected) => app.connected = connected,
        AppEvent::MemoryCount(count) => app.memory_count = count,
        AppEvent::RecordFailed(message) => app.push_note(message),
        AppEvent::Recall { query, results } => match results {
            Ok(results) => app.push_note(format_search_results(&query, &results)),
            Err(message) => app.push_note(message),
        },
        AppEvent::History(result) => match result {
            Ok(conversations) => app.push_note(format_history(&conversations)),
            Err(err) => app.push_note(format!("Error listing conversations: {err}")),
        },
        AppEvent::LastConversation(result) => match result {
            Ok(Some(conversation)) if !conversation.messages.is_empty() => {
                if app.is_streaming() {
                    app.push_note("Wait for the reply to finish before loading.");
                } else {
                    app.load_conversation(conversation);
                }
            }
            Ok(_) => app.push_note("No previous conversation found."),
            Err(err) => app.push_note(format!("Error loading conversation: {err}")),
        },
        AppEvent::Models(result) => match result {
            Ok(models) => app.push_note(format_models(&models, &runtime.client.model())),
            Err(err) => app.push_note(format!("Error listing models: {err}")),
        },
    }
    Ok(false)
}

/// Handle keyboard input and dispatch actions.
fn handle_input(key: KeyEvent, app: &mut App, runtime: &mut Runtime) -> anyhow::Result<bool> {
    if key.kind == KeyEventKind::Release {
        return Ok(false);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return Ok(true),
        KeyCode::Esc => {
            if app.is_streaming() {
                stop_stream(app, runtime);
            } else if app.show_slash_commands {
                app.show_slash_commands = false;
                app.input.clear();
            } else {
                return Ok(true);
            }
        }
        KeyCode::Char('n') if ctrl => start_new_conversation(app, runtime),
        KeyCode::Char('l') if ctrl => load_last_conversation(app, runtime),
        KeyCode::Char('e') if ctrl => export_conversation(app, runtime),
        KeyCode::Up => app.scroll_up(LINE_SCROLL),
        KeyCode::Down => app.scroll_down(LINE_SCROLL),
        KeyCode::PageUp => app.scroll_up(PAGE_SCROLL),
        KeyCode::PageDown => app.scroll_down(PAGE_SCROLL),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.enable_auto_scroll(),
        KeyCode::Enter => {
            let input = app.input.trim().to_string();
            if input.is_empty() {
                app.show_slash_commands = false;
                return Ok(false);
            }
            if input.starts_with('/') {
                app.input.clear();
                app.show_slash_commands = false;
                match parse_slash_command(&input) {
                    Ok(Some(command)) => handle_slash_command(command, app, runtime),
                    Ok(None) => {}
                    Err(message) => app.push_note(message),
                }
            } else if app.is_streaming() {
                app.status = "wait for the reply (Esc to stop)".to_string();
            } else {
                app.input.clear();
                send_message(input, app, runtime);
            }
        }
        KeyCode::Backspace => {
            app.input.pop();
            app.show_slash_commands = app.input.trim_start().starts_with('/');
        }
        KeyCode::Char(ch) if !ctrl => {
            app.input.push(ch);
            app.show_slash_commands = app.input.trim_start().starts_with('/');
        }
        _ => {}
    }
    Ok(false)
}

fn handle_slash_command(command: SlashCommand, app: &mut App, runtime: &mut Runtime) {
    debug!("handling slash command ({:?})", command);
    match command {
        SlashCommand::Help => app.push_note(HELP_TEXT),
        SlashCommand::Models => {
            app.status = "listing models".to_string();
            tasks::spawn_models(runtime.client.clone(), runtime.sender.clone());
        }
        SlashCommand::Model(name) => {
            runtime.client.set_model(&name);
            runtime.config.model = name.clone();
            app.model = name.clone();
            app.push_note(format!("Model set: {name}"));
        }
        SlashCommand::Search(query) => {
            let Some(memory) = runtime.memory.clone() else {
                app.push_note("Memory is not enabled.");
                return;
            };
            tasks::spawn_recall(
                &mut runtime.memory_tasks,
                memory,
                runtime.client.clone(),
                query,
                runtime.config.context_limit,
                runtime.sender.clone(),
            );
        }
        SlashCommand::History => {
            let Some(memory) = runtime.memory.clone() else {
                app.push_note("Memory is not enabled.");
                return;
            };
            tasks::spawn_history(&mut runtime.memory_tasks, memory, runtime.sender.clone());
        }
        SlashCommand::Clear => start_new_conversation(app, runtime),
        SlashCommand::Export => export_conversation(app, runtime),
    }
}

/// Add the prompt to the transcript and stream the reply.
fn send_message(prompt: String, app: &mut App, runtime: &mut Runtime) {
    info!(
        "sending message (conversation_id={}, prompt_len={})",
        app.conversation_id,
        prompt.len()
    );
    let id = app.begin_turn(prompt);
    let history = app.chat_history(&runtime.config.system_prompt);
    let handle = tasks::spawn_stream(runtime.client.clone(), id, history, runtime.sender.clone());
    if let Some(previous) = runtime.stream.replace(handle) {
        previous.abort();
    }
}

/// Abort the reply in flight; the prompt is still recorded.
fn stop_stream(app: &mut App, runtime: &mut Runtime) {
    if let Some(handle) = runtime.stream.take() {
        handle.abort();
    }
    if let Some(job) = app.cancel_stream() {
        info!("reply stopped (conversation_id={})", job.conversation_id);
        record(runtime, job);
    }
}

fn start_new_conversation(app: &mut App, runtime: &mut Runtime) {
    stop_stream(app, runtime);
    app.input.clear();
    app.new_conversation();
}

fn load_last_conversation(app: &mut App, runtime: &mut Runtime) {
    match runtime.memory.clone() {
        Some(memory) => {
            tasks::spawn_load_last(&mut runtime.memory_tasks, memory, runtime.sender.clone())
        }
        None => app.push_note("Memory is not enabled."),
    }
}

fn export_conversation(app: &mut App, runtime: &Runtime) {
    if !app.messages.iter().any(|entry| entry.role != dvkcli_memory::Role::System) {
        app.push_note("No messages to export.");
        return;
    }
    match export::write_export(&runtime.export_dir, &app.messages) {
        Ok(path) => app.push_note(format!("Conversation exported to: {}", path.display())),
        Err(err) => app.push_note(format!("Error exporting: {err}")),
    }
}

/// Hand a finished turn to the memory store, when there is one.
fn record(runtime: &mut Runtime, job: RecordJob) {
    let Some(memory) = runtime.memory.clone() else {
        return;
    };
    // Reap finished tasks.
    while runtime.memory_tasks.try_join_next().is_some() {}
    tasks::spawn_record(
        &mut runtime.memory_tasks,
        memory,
        runtime.client.clone(),
        job,
        runtime.sender.clone(),
    );
}

/// Configure terminal in raw mode with alternate screen.
fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal state on exit.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    debug!("restoring terminal");
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
