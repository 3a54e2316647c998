//! Configuration model and on-disk config handling for dvkcli.
//!
//! The config lives in `~/.dvkcli/config.json` next to the memory database.
//! Files are parsed as JSON5 and written back as pretty JSON.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Default locations under the user's home directory.
pub use loader::{config_dir, config_path, db_path, log_path};
/// Configuration schema models.
pub use model::*;
