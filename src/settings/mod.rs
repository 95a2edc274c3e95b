//! Claude Code settings resolution
//!
//! Reads the four file-backed layers (managed, user, project, local), merges
//! them by fixed precedence and optionally layers a runtime override on top.
//!
//! ```text
//! managed-settings.json      (lowest)
//! ~/.claude/settings.json
//! <project>/.claude/settings.json
//! <project>/.claude/settings.local.json
//! runtime config from the live session   (highest, out-of-band)
//! ```

pub mod layers;
pub mod merge;

pub use layers::SettingsLevel;
pub use merge::{deep_merge, merge_layers, SettingsMap};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Raw layers keyed by level; missing or invalid files are empty maps
pub type SettingsHierarchy = BTreeMap<SettingsLevel, SettingsMap>;

/// Everything known about the settings visible to a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsSummary {
    pub hierarchy: SettingsHierarchy,
    pub file_based: SettingsMap,
    pub runtime: SettingsMap,
    pub effective: SettingsMap,
    pub active_sources: Vec<String>,
    pub total_keys: usize,
    pub has_runtime_overrides: bool,
}

/// Resolves effective settings from the layered files
#[derive(Debug, Clone)]
pub struct SettingsResolver {
    managed_path: PathBuf,
    user_settings_path: PathBuf,
}

impl SettingsResolver {
    /// Create a resolver rooted at the user's Claude directory (`~/.claude`)
    pub fn new(claude_dir: &Path) -> Self {
        Self::with_managed_path(claude_dir, layers::managed_settings_path())
    }

    /// Create a resolver with an explicit managed settings path (used for testing)
    pub fn with_managed_path(claude_dir: &Path, managed_path: PathBuf) -> Self {
        Self {
            managed_path,
            user_settings_path: claude_dir.join(layers::SETTINGS_FILENAME),
        }
    }

    /// Read a settings file, yielding an empty layer on any failure
    pub fn read_settings_file(path: &Path) -> SettingsMap {
        if !path.exists() {
            return SettingsMap::new();
        }

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Error reading settings {}: {}", path.display(), e);
                return SettingsMap::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("Settings {} is not a JSON object, ignoring", path.display());
                SettingsMap::new()
            }
            Err(e) => {
                tracing::warn!("Invalid JSON in {}: {}", path.display(), e);
                SettingsMap::new()
            }
        }
    }

    /// Read every layer independently
    pub fn get_settings_hierarchy(&self, project_path: Option<&Path>) -> SettingsHierarchy {
        let mut hierarchy: SettingsHierarchy = SettingsLevel::PRECEDENCE
            .iter()
            .map(|level| (*level, SettingsMap::new()))
            .collect();

        hierarchy.insert(
            SettingsLevel::Managed,
            Self::read_settings_file(&self.managed_path),
        );
        hierarchy.insert(
            SettingsLevel::User,
            Self::read_settings_file(&self.user_settings_path),
        );

        if let Some(project) = project_path {
            hierarchy.insert(
                SettingsLevel::Project,
                Self::read_settings_file(&layers::project_settings_path(project)),
            );
            hierarchy.insert(
                SettingsLevel::Local,
                Self::read_settings_file(&layers::local_settings_path(project)),
            );
        }

        hierarchy
    }

    /// Effective settings from files only, before any runtime override
    pub fn compute_effective_settings(&self, project_path: Option<&Path>) -> SettingsMap {
        effective_from_hierarchy(&self.get_settings_hierarchy(project_path))
    }

    /// Layer the runtime config over file-based settings at highest precedence
    pub fn merge_runtime_overrides(file_based: &SettingsMap, runtime: &SettingsMap) -> SettingsMap {
        let mut result = file_based.clone();
        deep_merge(&mut result, runtime);
        result
    }

    pub fn get_settings_summary(
        &self,
        project_path: Option<&Path>,
        runtime_config: Option<&SettingsMap>,
    ) -> SettingsSummary {
        let hierarchy = self.get_settings_hierarchy(project_path);
        let file_based = effective_from_hierarchy(&hierarchy);

        let runtime = runtime_config.cloned().unwrap_or_default();
        let has_runtime_overrides = !runtime.is_empty();
        let effective = if has_runtime_overrides {
            Self::merge_runtime_overrides(&file_based, &runtime)
        } else {
            file_based.clone()
        };

        let mut active_sources: Vec<String> = hierarchy
            .iter()
            .filter(|(_, layer)| !layer.is_empty())
            .map(|(level, _)| level.to_string())
            .collect();
        if has_runtime_overrides {
            active_sources.push("runtime".to_string());
        }

        SettingsSummary {
            total_keys: effective.len(),
            hierarchy,
            file_based,
            runtime,
            effective,
            active_sources,
            has_runtime_overrides,
        }
    }
}

/// BTreeMap iteration follows `SettingsLevel`'s ordering, which is precedence order
fn effective_from_hierarchy(hierarchy: &SettingsHierarchy) -> SettingsMap {
    merge_layers(hierarchy.values())
}
