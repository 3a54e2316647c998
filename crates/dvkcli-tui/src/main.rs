//! dvkcli: chat with a local model server from the terminal.

use anyhow::Context;
use clap::Parser;
use dvkcli_config::{DvkConfig, log_path};
use dvkcli_memory::Memory;
use dvkcli_ollama::OllamaClient;
use dvkcli_tui::Session;
use log::{LevelFilter, info, warn};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line options for the chat client.
#[derive(Parser)]
#[command(name = "dvkcli", version)]
struct Cli {
    /// Optional path to a config file (defaults to ~/.dvkcli/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Chat model for this session
    #[arg(long)]
    model: Option<String>,
    /// Model server base URL
    #[arg(long)]
    url: Option<String>,
    /// Run without conversation memory
    #[arg(long)]
    no_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();
    info!(
        "starting dvkcli (config_set={}, model_set={}, url_set={}, no_memory={})",
        cli.config.is_some(),
        cli.model.is_some(),
        cli.url.is_some(),
        cli.no_memory
    );

    let mut config = match cli.config.as_ref() {
        Some(path) => DvkConfig::load_or_default(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DvkConfig::load().context("failed to load config")?,
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(url) = cli.url {
        config.ollama_url = url;
    }
    if cli.no_memory {
        config.memory_enabled = false;
    }
    config.validate().context("invalid configuration")?;

    let client = OllamaClient::new(&config.ollama_url, &config.model, &config.embed_model)
        .context("failed to build model client")?;
    info!(
        "model client ready (url={}, model={}, cloud={})",
        client.base_url(),
        client.model(),
        client.is_cloud()
    );

    let mut notices = Vec::new();
    let memory = if config.memory_enabled {
        match open_memory(&config) {
            Ok(memory) => Some(Arc::new(memory)),
            Err(err) => {
                warn!("memory disabled for this session: {err:#}");
                notices.push(format!("Memory unavailable: {err:#}"));
                None
            }
        }
    } else {
        None
    };

    let result = dvkcli_tui::run(Session {
        config,
        client: Arc::new(client),
        memory: memory.clone(),
        notices,
    })
    .await;
    let closed = memory.map_or(Ok(()), dvkcli_tui::close_memory);
    if let Err(err) = &closed {
        warn!("memory close failed: {err:#}");
    }
    let config = result?;

    match cli.config.as_ref() {
        Some(path) => config
            .save_to_path(path)
            .with_context(|| format!("failed to save config to {}", path.display()))?,
        None => config.save().context("failed to save config")?,
    }
    closed?;
    info!("dvkcli exited");
    Ok(())
}

fn open_memory(config: &DvkConfig) -> anyhow::Result<Memory> {
    let path = config.resolved_db_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let memory = Memory::open(&path)
        .with_context(|| format!("failed to open memory at {}", path.display()))?;
    info!("memory opened (path={})", path.display());
    Ok(memory)
}

/// Log to ~/.dvkcli/dvkcli.log; the terminal belongs to the UI.
fn init_logging() {
    let mut builder = env_logger::builder();
    builder
        .format_timestamp_millis()
        .filter_level(LevelFilter::Info)
        .parse_default_env();
    let file = log_path().ok().and_then(|path| {
        let parent = path.parent()?;
        fs::create_dir_all(parent).ok()?;
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // No log file: discard rather than draw over the UI.
        None => {
            builder.target(env_logger::Target::Pipe(Box::new(io::sink())));
        }
    }
    let _ = builder.try_init();
}
