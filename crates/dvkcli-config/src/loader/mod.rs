//! Config file discovery, parsing, and persistence.
//!
//! Everything lives under `~/.dvkcli`: the config file, the memory database
//! and the log file. A missing config file means defaults.

mod schema;

#[cfg(test)]
mod tests;

use crate::{ConfigError, DvkConfig};
use directories::UserDirs;
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".dvkcli";
const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "memory.db";
const LOG_FILE: &str = "dvkcli.log";

/// `~/.dvkcli`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_CONFIG_DIR))
        .ok_or(ConfigError::NoHomeDir)
}

/// `~/.dvkcli/config.json`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// `~/.dvkcli/memory.db`.
pub fn db_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(DB_FILE))
}

/// `~/.dvkcli/dvkcli.log`.
pub fn log_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(LOG_FILE))
}

impl DvkConfig {
    /// Load the user config, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(config_path()?)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("config file missing; using defaults (path={})", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    /// Load a config from a path.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, &path.display().to_string())
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Write the config to `~/.dvkcli/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(config_path()?)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        debug!("config saved (path={})", path.display());
        Ok(())
    }

    /// Database path, honouring `memory_path`.
    pub fn resolved_db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.memory_path {
            Some(path) => Ok(path.clone()),
            None => db_path(),
        }
    }

    /// Validate invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.ollama_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(schema::invalid_field(
                "config",
                "ollama_url",
                "expected an http:// or https:// url",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(schema::invalid_field("config", "model", "must not be empty"));
        }
        if self.embed_model.trim().is_empty() {
            return Err(schema::invalid_field(
                "config",
                "embed_model",
                "must not be empty",
            ));
        }
        if self.context_limit == 0 {
            return Err(schema::invalid_field(
                "config",
                "context_limit",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn config_from_value(value: Value, label: &str) -> Result<DvkConfig, ConfigError> {
    schema::validate_schema(&value, label)?;
    let config: DvkConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
