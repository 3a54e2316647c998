//! Tests for config loading and saving.

use super::*;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

#[test]
fn parse_minimal_config() {
    let config = DvkConfig::load_from_str("{}").expect("config");
    assert_eq!(config, DvkConfig::default());
    assert_eq!(config.ollama_url, "http://localhost:11434");
    assert_eq!(config.model, "qwen2.5:3b");
    assert_eq!(config.embed_model, "nomic-embed-text");
    assert_eq!(config.context_limit, 5);
    assert!(config.memory_enabled);
    assert_eq!(config.memory_path, None);
}

/// Fields that are present override defaults; the rest keep theirs.
#[test]
fn partial_config_keeps_other_defaults() {
    let json5 = r#"{
        // comments and trailing commas are accepted
        model: "llama3.2",
        memory_enabled: false,
    }"#;
    let config = DvkConfig::load_from_str(json5).expect("config");
    assert_eq!(config.model, "llama3.2");
    assert!(!config.memory_enabled);
    assert_eq!(config.embed_model, "nomic-embed-text");
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = DvkConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("unknown key"));
    assert!(msg.contains("unexpected"));
}

#[test]
fn rejects_wrong_field_types() {
    let err = DvkConfig::load_from_str(r#"{ memory_enabled: "yes" }"#).unwrap_err();
    assert!(format!("{err}").contains("memory_enabled"));

    let err = DvkConfig::load_from_str(r#"{ context_limit: -1 }"#).unwrap_err();
    assert!(format!("{err}").contains("context_limit"));
}

#[test]
fn rejects_invalid_values() {
    let err = DvkConfig::load_from_str(r#"{ ollama_url: "localhost:11434" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidField { ref path, .. } if path == "config:ollama_url"));

    let err = DvkConfig::load_from_str(r#"{ model: "  " }"#).unwrap_err();
    assert!(format!("{err}").contains("model"));

    let err = DvkConfig::load_from_str(r#"{ context_limit: 0 }"#).unwrap_err();
    assert!(format!("{err}").contains("context_limit"));
}

#[test]
fn rejects_non_object_root() {
    let err = DvkConfig::load_from_str("[1, 2]").unwrap_err();
    assert!(format!("{err}").contains("root"));
}

#[test]
fn missing_file_yields_defaults() {
    let temp = TempDir::new().expect("tmp");
    let config = DvkConfig::load_or_default(temp.path().join("config.json")).expect("config");
    assert_eq!(config, DvkConfig::default());
}

#[test]
fn load_from_path_reads_json5() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("nested").join("config.json");
    write_json5(&path, r#"{ theme: "plain", context_limit: 8 }"#);

    let config = DvkConfig::load_or_default(&path).expect("config");
    assert_eq!(config.theme, "plain");
    assert_eq!(config.context_limit, 8);
}

/// Saving creates the directory and the file loads back unchanged.
#[test]
fn save_then_load_preserves_changes() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join(".dvkcli").join("config.json");
    let config = DvkConfig {
        model: "mistral".to_string(),
        memory_path: Some(temp.path().join("elsewhere.db")),
        ..DvkConfig::default()
    };

    config.save_to_path(&path).expect("save");
    let written = fs::read_to_string(&path).expect("read");
    assert!(written.contains("\n  \"model\": \"mistral\""));

    let loaded = DvkConfig::load_from_path(&path).expect("load");
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.resolved_db_path().expect("db path"),
        temp.path().join("elsewhere.db")
    );
}

#[test]
fn save_refuses_invalid_config() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("config.json");
    let config = DvkConfig {
        context_limit: 0,
        ..DvkConfig::default()
    };
    assert!(config.save_to_path(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn default_paths_share_one_directory() {
    let (Ok(dir), Ok(config), Ok(db), Ok(log)) = (config_dir(), config_path(), db_path(), log_path())
    else {
        return;
    };
    assert!(dir.ends_with(".dvkcli"));
    assert_eq!(config, dir.join("config.json"));
    assert_eq!(db, dir.join("memory.db"));
    assert_eq!(log, dir.join("dvkcli.log"));
}
