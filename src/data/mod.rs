use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form JSON object attached to sessions and captured messages
pub type Metadata = Map<String, Value>;

/// How a Claude Code session began
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Startup,
    Resume,
    Clear,
    Compact,
}

impl SessionSource {
    /// Parse the hook's `source` string; unknown values are treated as absent
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "startup" => Some(Self::Startup),
            "resume" => Some(Self::Resume),
            "clear" => Some(Self::Clear),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Exit,
    Logout,
    Clear,
    PromptInputExit,
    #[serde(other)]
    Other,
}

impl EndReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "exit" => Self::Exit,
            "logout" => Self::Logout,
            "clear" => Self::Clear,
            "prompt_input_exit" => Self::PromptInputExit,
            _ => Self::Other,
        }
    }
}

/// A single Claude Code session as persisted by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub project_path: String,
    pub project_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Runtime context reported by the agent (transcript path, permission mode, ...)
    #[serde(default)]
    pub metadata: Metadata,
    /// Monitor-owned augmentations, preserved across resumes
    #[serde(default)]
    pub monitor_metadata: Metadata,
    pub reason: Option<EndReason>,
    pub source: Option<SessionSource>,
}

impl Session {
    /// Seconds between start and end, if the session has ended
    pub fn duration_seconds(&self) -> Option<f64> {
        self.ended_at
            .map(|end| end.signed_duration_since(self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// One tool invocation recorded against a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: Uuid,
    pub session_id: String,
    pub tool_name: String,
    pub parameters: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPrompt {
    pub id: Uuid,
    pub session_id: String,
    pub prompt_text: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Opaque vector produced by the embedding collaborator
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: Uuid,
    pub session_id: String,
    pub message_text: String,
    pub conversation_turn: u32,
    #[serde(default)]
    pub metadata: Metadata,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// Read view of a session with the attributes derived from its child records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub duration_seconds: Option<f64>,
    pub tool_execution_count: usize,
    pub last_activity: DateTime<Utc>,
    pub tool_executions: Vec<ToolExecution>,
}

impl SessionDetail {
    pub fn new(session: Session, tool_executions: Vec<ToolExecution>) -> Self {
        let last_tool = tool_executions.iter().map(|t| t.executed_at).max();
        let last_activity = [Some(session.started_at), session.ended_at, last_tool]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(session.started_at);

        Self {
            duration_seconds: session.duration_seconds(),
            tool_execution_count: tool_executions.len(),
            last_activity,
            session,
            tool_executions,
        }
    }
}

/// Aggregate statistics over every stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub sessions_last_24h: u64,
    pub total_tools_executed: u64,
    pub average_session_duration_seconds: f64,
    pub unique_projects: u64,
}
