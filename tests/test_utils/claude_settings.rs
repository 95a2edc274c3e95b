#![allow(dead_code)]
//! Test utilities for layered Claude settings

use claudia::settings::SettingsResolver;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test environment with a temporary home, project and managed settings file
pub struct TestClaudeEnv {
    pub temp_dir: TempDir,
    pub claude_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub project_dir: PathBuf,
    pub managed_path: PathBuf,
}

impl TestClaudeEnv {
    /// Create a new test environment with temporary directories
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let claude_dir = temp_dir.path().join(".claude");
        let projects_dir = claude_dir.join("projects");
        let project_dir = temp_dir.path().join("work").join("app");
        let managed_path = temp_dir.path().join("etc").join("managed-settings.json");

        std::fs::create_dir_all(&projects_dir).expect("Failed to create projects dir");
        std::fs::create_dir_all(&project_dir).expect("Failed to create project dir");

        Self {
            temp_dir,
            claude_dir,
            projects_dir,
            project_dir,
            managed_path,
        }
    }

    /// Resolver that reads this environment's managed and user files
    pub fn resolver(&self) -> SettingsResolver {
        SettingsResolver::with_managed_path(&self.claude_dir, self.managed_path.clone())
    }

    pub fn user_settings_path(&self) -> PathBuf {
        self.claude_dir.join("settings.json")
    }

    pub fn project_settings_path(&self) -> PathBuf {
        self.project_dir.join(".claude").join("settings.json")
    }

    pub fn local_settings_path(&self) -> PathBuf {
        self.project_dir.join(".claude").join("settings.local.json")
    }

    pub fn write_managed(&self, settings: &Value) {
        write_json(&self.managed_path, settings);
    }

    pub fn write_user(&self, settings: &Value) {
        write_json(&self.user_settings_path(), settings);
    }

    pub fn write_project(&self, settings: &Value) {
        write_json(&self.project_settings_path(), settings);
    }

    pub fn write_local(&self, settings: &Value) {
        write_json(&self.local_settings_path(), settings);
    }

    /// Create a session directory under the projects root
    pub fn create_session_dir(&self, session_id: &str) -> PathBuf {
        let dir = self.projects_dir.join(session_id);
        std::fs::create_dir_all(&dir).expect("Failed to create session dir");
        dir
    }
}

impl Default for TestClaudeEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    let content = serde_json::to_string_pretty(value).expect("Failed to serialize settings");
    std::fs::write(path, content).expect("Failed to write settings");
}

pub fn write_raw(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(path, content).expect("Failed to write file");
}
