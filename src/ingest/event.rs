//! Domain events produced by ingestion and consumed by the registry and bus

use crate::settings::{SettingsLevel, SettingsMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_SESSION_START: &str = "session_start";
pub const EVENT_TOOL_EXECUTION: &str = "tool_execution";
pub const EVENT_USER_PROMPT: &str = "user_prompt";
pub const EVENT_SETTINGS_UPDATE: &str = "settings_update";

/// An immutable, typed fact observed on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    SessionStart {
        session_id: String,
        project_path: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    ToolExecution {
        session_id: String,
        tool_name: String,
        #[serde(default)]
        parameters: Value,
        #[serde(default)]
        timestamp: Option<String>,
    },
    UserPrompt {
        session_id: String,
        content: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    SettingsUpdate {
        level: SettingsLevel,
        settings: SettingsMap,
        path: String,
    },
}

impl DomainEvent {
    /// Wire name of the event, used as the broadcast type
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => EVENT_SESSION_START,
            Self::ToolExecution { .. } => EVENT_TOOL_EXECUTION,
            Self::UserPrompt { .. } => EVENT_USER_PROMPT,
            Self::SettingsUpdate { .. } => EVENT_SETTINGS_UPDATE,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionStart { session_id, .. }
            | Self::ToolExecution { session_id, .. }
            | Self::UserPrompt { session_id, .. } => Some(session_id),
            Self::SettingsUpdate { .. } => None,
        }
    }
}
