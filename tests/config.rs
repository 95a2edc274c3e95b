//! Tests for application config loading

use claudia::config::{self, Config};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = config::load(Some(&dir.path().join("config.toml"))).unwrap();

    assert_eq!(config.sessions.timeout_minutes, 60);
    assert_eq!(config.bus.subscriber_buffer, 256);
    assert_eq!(config.embeddings.model, "openai/text-embedding-3-small");
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[paths]
claude_dir = "/tmp/custom-claude"

[sessions]
timeout_minutes = 15
"#,
    )
    .unwrap();

    let config = config::load_from_path(&path).unwrap();
    assert_eq!(config.paths.claude_dir, PathBuf::from("/tmp/custom-claude"));
    assert_eq!(
        config.paths.projects_dir(),
        PathBuf::from("/tmp/custom-claude/projects")
    );
    assert_eq!(config.sessions.timeout(), chrono::Duration::minutes(15));
    assert_eq!(config.bus.subscriber_buffer, 256);
    assert_eq!(config.embeddings.base_url, "https://openrouter.ai/api/v1");
}

#[test]
fn invalid_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sessions\ntimeout_minutes = ").unwrap();

    let err = config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn env_overrides_take_precedence() {
    let mut config = Config::default();
    config::apply_env_overrides(&mut config, |key| match key {
        "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
        "CLAUDIA_SETTINGS_PATH" => Some("/tmp/claude-home".to_string()),
        "CLAUDIA_PROJECTS_PATH" => Some("/tmp/projects".to_string()),
        _ => None,
    });

    assert_eq!(config.embeddings.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.paths.claude_dir, PathBuf::from("/tmp/claude-home"));
    assert_eq!(config.paths.projects_dir(), PathBuf::from("/tmp/projects"));
}

#[test]
fn empty_env_values_are_ignored() {
    let mut config = Config::default();
    let claude_dir = config.paths.claude_dir.clone();
    config::apply_env_overrides(&mut config, |_| Some(String::new()));

    assert_eq!(config.embeddings.api_key, None);
    assert_eq!(config.paths.claude_dir, claude_dir);
    assert_eq!(config.paths.projects_dir, None);
}

#[test]
fn init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let written = config::init(Some(&path)).unwrap();
    assert_eq!(written, path);

    let config = config::load_from_path(&path).unwrap();
    assert_eq!(config.sessions.timeout_minutes, 60);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    assert!(config::init(Some(&path)).is_err());
}
