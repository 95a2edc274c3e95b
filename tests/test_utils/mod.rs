#![allow(dead_code)]
//! Test utilities and fixtures for claudia tests

pub mod claude_settings;

use chrono::{Duration, Utc};
use claudia::data::{Metadata, Session};
use claudia::registry::{DisabledEmbeddings, SessionRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

/// Registry with embeddings disabled and the default 60 minute timeout
pub fn registry() -> SessionRegistry {
    SessionRegistry::new(Arc::new(DisabledEmbeddings), Duration::minutes(60))
}

/// An active session record that started `minutes_ago`
pub fn session_started(session_id: &str, project_path: &str, minutes_ago: i64) -> Session {
    Session {
        session_id: session_id.to_string(),
        project_path: project_path.to_string(),
        project_name: claudia::registry::project_name(project_path),
        started_at: Utc::now() - Duration::minutes(minutes_ago),
        ended_at: None,
        is_active: true,
        metadata: Metadata::new(),
        monitor_metadata: Metadata::new(),
        reason: None,
        source: None,
    }
}

/// A transcript `tool_use` line
pub fn tool_use_line(name: &str, input: Value) -> String {
    json!({"type": "tool_use", "name": name, "input": input}).to_string()
}

/// A transcript `user_message` line
pub fn user_message_line(content: &str) -> String {
    json!({
        "type": "user_message",
        "content": content,
        "timestamp": "2025-01-01T12:00:00Z"
    })
    .to_string()
}
