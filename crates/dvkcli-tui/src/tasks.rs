//! Background tasks that report back through the event channel.

use crate::app::RecordJob;
use crate::event::AppEvent;
use crossterm::event::{Event as CrosstermEvent, KeyModifiers, MouseEventKind};
use dvkcli_memory::{Memory, MemoryError};
use dvkcli_ollama::{ChatMessage, OllamaClient};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Conversations listed by `/history`.
const HISTORY_LIMIT: usize = 10;

/// Stream a reply for `history`, forwarding deltas tagged with `id`.
pub fn spawn_stream(
    client: Arc<OllamaClient>,
    id: u64,
    history: Vec<ChatMessage>,
    sender: mpsc::Sender<AppEvent>,
) -> JoinHandle<()> {
    debug!("starting reply stream (id={}, messages={})", id, history.len());
    tokio::spawn(async move {
        let delta_sender = sender.clone();
        let result = client
            .chat_stream(&history, |delta| {
                // Lossy; StreamDone carries the whole reply.
                let _ = delta_sender.try_send(AppEvent::StreamDelta {
                    id,
                    delta: delta.to_string(),
                });
            })
            .await;
        let event = match result {
            Ok(content) => AppEvent::StreamDone { id, content },
            Err(err) => AppEvent::StreamFailed {
                id,
                error: err.to_string(),
            },
        };
        let _ = sender.send(event).await;
    })
}

/// Store a finished turn, then refresh the memory count.
///
/// The save is tracked in `tasks` so shutdown can wait for it.
pub fn spawn_record(
    tasks: &mut JoinSet<()>,
    memory: Arc<Memory>,
    client: Arc<OllamaClient>,
    job: RecordJob,
    sender: mpsc::Sender<AppEvent>,
) {
    tasks.spawn(async move {
        let RecordJob {
            conversation_id,
            title,
            messages,
        } = job;
        match memory
            .record_turn(&conversation_id, &title, messages, client.as_ref())
            .await
        {
            Ok(report) if !report.is_complete() => {
                let reasons: Vec<String> = report
                    .failures
                    .iter()
                    .map(|(_, err)| err.to_string())
                    .collect();
                let _ = sender
                    .send(AppEvent::RecordFailed(format!(
                        "{} of the turn's messages were not saved: {}",
                        report.failures.len(),
                        reasons.join("; ")
                    )))
                    .await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("turn not recorded (conversation_id={}): {err}", conversation_id);
                let _ = sender
                    .send(AppEvent::RecordFailed(format!("turn not saved: {err}")))
                    .await;
            }
        }
        send_memory_count(&memory, &sender).await;
    });
}

/// Report the stored message count.
pub fn spawn_memory_count(
    tasks: &mut JoinSet<()>,
    memory: Arc<Memory>,
    sender: mpsc::Sender<AppEvent>,
) {
    tasks.spawn(async move {
        send_memory_count(&memory, &sender).await;
    });
}

async fn send_memory_count(memory: &Arc<Memory>, sender: &mpsc::Sender<AppEvent>) {
    match off_worker(memory, Memory::count).await {
        Ok(count) => {
            let _ = sender.send(AppEvent::MemoryCount(count)).await;
        }
        Err(err) => warn!("failed to count memories: {err}"),
    }
}

/// Run a synchronous store read on the blocking pool.
async fn off_worker<T, F>(memory: &Arc<Memory>, read: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&Memory) -> Result<T, MemoryError> + Send + 'static,
{
    let memory = Arc::clone(memory);
    match tokio::task::spawn_blocking(move || read(&memory)).await {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(err) => Err(format!("store task failed: {err}")),
    }
}

/// Semantic search over stored prompts for `/search`.
pub fn spawn_recall(
    tasks: &mut JoinSet<()>,
    memory: Arc<Memory>,
    client: Arc<OllamaClient>,
    query: String,
    limit: usize,
    sender: mpsc::Sender<AppEvent>,
) {
    tasks.spawn(async move {
        let results = memory
            .recall(&query, client.as_ref(), limit)
            .await
            .map_err(|err| match err {
                MemoryError::EmbeddingUnavailable(reason) => {
                    format!("Error generating embedding: {reason}")
                }
                other => format!("Error searching: {other}"),
            });
        let _ = sender.send(AppEvent::Recall { query, results }).await;
    });
}

/// Recent conversations for `/history`.
pub fn spawn_history(
    tasks: &mut JoinSet<()>,
    memory: Arc<Memory>,
    sender: mpsc::Sender<AppEvent>,
) {
    tasks.spawn(async move {
        let result = off_worker(&memory, |memory| {
            memory.recent_conversations(HISTORY_LIMIT)
        })
        .await;
        let _ = sender.send(AppEvent::History(result)).await;
    });
}

/// Most recent conversation for Ctrl+L.
pub fn spawn_load_last(
    tasks: &mut JoinSet<()>,
    memory: Arc<Memory>,
    sender: mpsc::Sender<AppEvent>,
) {
    tasks.spawn(async move {
        let result = off_worker(&memory, Memory::last_conversation).await;
        let _ = sender.send(AppEvent::LastConversation(result)).await;
    });
}

/// Wait for every tracked memory task to finish.
pub async fn drain(tasks: &mut JoinSet<()>) {
    if !tasks.is_empty() {
        debug!("waiting for memory tasks (pending={})", tasks.len());
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            warn!("memory task ended abnormally: {err}");
        }
    }
}

/// Installed models for `/models`.
pub fn spawn_models(client: Arc<OllamaClient>, sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let result = client.list_models().await.map_err(|err| err.to_string());
        let _ = sender.send(AppEvent::Models(result)).await;
    });
}

/// Probe the model server.
pub fn spawn_connection_check(client: Arc<OllamaClient>, sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let connected = client.is_connected().await;
        let _ = sender.send(AppEvent::Connection(connected)).await;
    });
}

/// Poll the terminal for key and mouse input.
pub fn spawn_input_handler(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        const MOUSE_SCROLL_LINES: i16 = 3;
        loop {
            if let Ok(true) = crossterm::event::poll(Duration::from_millis(30)) {
                while let Ok(true) = crossterm::event::poll(Duration::from_millis(0)) {
                    let event = match crossterm::event::read() {
                        Ok(event) => event,
                        Err(_) => break,
                    };
                    let forwarded = match event {
                        CrosstermEvent::Key(key) => Some(AppEvent::Input(key)),
                        CrosstermEvent::Mouse(mouse) => {
                            let lines = if mouse.modifiers.contains(KeyModifiers::SHIFT) {
                                MOUSE_SCROLL_LINES.saturating_mul(2)
                            } else {
                                MOUSE_SCROLL_LINES
                            };
                            match mouse.kind {
                                MouseEventKind::ScrollUp => Some(AppEvent::Scroll(-lines)),
                                MouseEventKind::ScrollDown => Some(AppEvent::Scroll(lines)),
                                _ => None,
                            }
                        }
                        _ => None,
                    };
                    if let Some(event) = forwarded {
                        if sender.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });
}

/// Spawn a periodic tick event generator.
pub fn spawn_tick(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(150));
        loop {
            interval.tick().await;
            if sender.send(AppEvent::Tick).await.is_err() {
                return;
            }
        }
    });
}
