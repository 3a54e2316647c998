//! Schema validation helpers for the JSON5 config file.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Keys accepted at the root of the config file.
const ALLOWED_KEYS: &[&str] = &[
    "$schema",
    "ollama_url",
    "model",
    "embed_model",
    "system_prompt",
    "memory_enabled",
    "context_limit",
    "theme",
    "memory_path",
];

/// Validate the raw document shape before decoding.
pub(super) fn validate_schema(value: &Value, label: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, label, "")?;
    ensure_allowed_keys(map, ALLOWED_KEYS, label)?;

    for key in [
        "$schema",
        "ollama_url",
        "model",
        "embed_model",
        "system_prompt",
        "theme",
        "memory_path",
    ] {
        if let Some(value) = map.get(key) {
            expect_string(value, label, key)?;
        }
    }
    if let Some(value) = map.get("memory_enabled") {
        expect_bool(value, label, "memory_enabled")?;
    }
    if let Some(value) = map.get("context_limit") {
        expect_u64(value, label, "context_limit")?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    label: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(label, path, "expected object")),
    }
}

fn expect_string(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(label, path, "expected string"))
    }
}

fn expect_bool(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(label, path, "expected bool"))
    }
}

/// Non-negative integers only; `context_limit` decodes into `usize`.
fn expect_u64(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(label, path, "expected non-negative integer"))
    }
}

fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    label: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(label, key, "unknown key")),
        None => Ok(()),
    }
}

/// Build a structured invalid-field error.
pub(super) fn invalid_field(label: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{label}:{normalized_path}"),
        message: message.to_string(),
    }
}
