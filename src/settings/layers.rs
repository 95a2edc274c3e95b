//! Claude Code settings layers and where each one lives on disk

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILENAME: &str = "settings.json";
pub const LOCAL_SETTINGS_FILENAME: &str = "settings.local.json";
pub const MANAGED_SETTINGS_FILENAME: &str = "managed-settings.json";
pub const CLAUDE_DIR_NAME: &str = ".claude";

/// A settings source. Variant order is precedence order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsLevel {
    Managed,
    User,
    Project,
    Local,
}

impl SettingsLevel {
    /// Every file-backed level, lowest precedence first
    pub const PRECEDENCE: [SettingsLevel; 4] = [
        SettingsLevel::Managed,
        SettingsLevel::User,
        SettingsLevel::Project,
        SettingsLevel::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for SettingsLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enterprise managed settings, outside user control
pub fn managed_settings_path() -> PathBuf {
    let dir = if cfg!(target_os = "macos") {
        "/Library/Application Support/ClaudeCode"
    } else if cfg!(target_os = "windows") {
        "C:/ProgramData/ClaudeCode"
    } else {
        "/etc/claude-code"
    };
    Path::new(dir).join(MANAGED_SETTINGS_FILENAME)
}

pub fn project_settings_path(project: &Path) -> PathBuf {
    project.join(CLAUDE_DIR_NAME).join(SETTINGS_FILENAME)
}

pub fn local_settings_path(project: &Path) -> PathBuf {
    project.join(CLAUDE_DIR_NAME).join(LOCAL_SETTINGS_FILENAME)
}

/// Whether a path names a file the settings watcher cares about
pub fn is_settings_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            matches!(
                name,
                SETTINGS_FILENAME | LOCAL_SETTINGS_FILENAME | MANAGED_SETTINGS_FILENAME
            )
        })
}

/// Infer which layer a changed settings file belongs to.
///
/// `claude_dir` is the user's `~/.claude`; a `settings.json` directly inside it
/// is the user layer, any other `.claude/settings.json` belongs to a project.
pub fn infer_level(path: &Path, claude_dir: &Path) -> SettingsLevel {
    if path == managed_settings_path() {
        return SettingsLevel::Managed;
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name == LOCAL_SETTINGS_FILENAME {
        return SettingsLevel::Local;
    }

    match path.parent() {
        Some(parent) if parent == claude_dir => SettingsLevel::User,
        _ => SettingsLevel::Project,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_is_ascending() {
        let mut sorted = SettingsLevel::PRECEDENCE;
        sorted.sort();
        assert_eq!(sorted, SettingsLevel::PRECEDENCE);
        assert!(SettingsLevel::Managed < SettingsLevel::Local);
    }

    #[test]
    fn test_infer_user_level() {
        let claude_dir = Path::new("/home/me/.claude");
        assert_eq!(
            infer_level(&claude_dir.join("settings.json"), claude_dir),
            SettingsLevel::User
        );
    }

    #[test]
    fn test_infer_project_and_local_levels() {
        let claude_dir = Path::new("/home/me/.claude");
        let project = Path::new("/work/app");
        assert_eq!(
            infer_level(&project_settings_path(project), claude_dir),
            SettingsLevel::Project
        );
        assert_eq!(
            infer_level(&local_settings_path(project), claude_dir),
            SettingsLevel::Local
        );
    }

    #[test]
    fn test_infer_managed_level() {
        let claude_dir = Path::new("/home/me/.claude");
        assert_eq!(
            infer_level(&managed_settings_path(), claude_dir),
            SettingsLevel::Managed
        );
    }

    #[test]
    fn test_is_settings_file() {
        assert!(is_settings_file(Path::new("/a/.claude/settings.json")));
        assert!(is_settings_file(Path::new("/a/.claude/settings.local.json")));
        assert!(is_settings_file(Path::new("/etc/claude-code/managed-settings.json")));
        assert!(!is_settings_file(Path::new("/a/.claude/projects/s1/t.jsonl")));
        assert!(!is_settings_file(Path::new("/a/.claude/mysettings.json")));
        assert!(!is_settings_file(Path::new("/a/.claude/old-settings.json")));
    }
}
