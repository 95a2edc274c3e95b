//! Transcript line parsing
//!
//! Each transcript line is one JSON record tagged by `type`. Only `tool_use`
//! and `user_message` records become domain events; everything else is dropped.

use super::event::DomainEvent;
use serde::Deserialize;
use serde_json::Value;

pub const TRANSCRIPT_EVENT_TOOL_USE: &str = "tool_use";
pub const TRANSCRIPT_EVENT_USER_MESSAGE: &str = "user_message";

/// The subset of a transcript record the parser looks at
#[derive(Debug, Clone, Default, Deserialize)]
struct TranscriptRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    input: Option<Value>,
    content: Option<Value>,
    timestamp: Option<String>,
}

/// Classify an already-decoded transcript record.
///
/// Pure: no I/O, no logging. Records without a recognized `type` yield `None`.
pub fn parse_record(record: &Value, session_id: &str) -> Option<DomainEvent> {
    let record = TranscriptRecord::deserialize(record).ok()?;

    match record.kind.as_deref()? {
        TRANSCRIPT_EVENT_TOOL_USE => Some(DomainEvent::ToolExecution {
            session_id: session_id.to_string(),
            tool_name: record.name.unwrap_or_default(),
            parameters: record
                .input
                .unwrap_or_else(|| Value::Object(Default::default())),
            timestamp: record.timestamp,
        }),
        TRANSCRIPT_EVENT_USER_MESSAGE => Some(DomainEvent::UserPrompt {
            session_id: session_id.to_string(),
            content: content_text(record.content),
            timestamp: record.timestamp,
        }),
        _ => None,
    }
}

/// Decode and classify one raw transcript line
pub fn parse_line(line: &str, session_id: &str) -> Result<Option<DomainEvent>, serde_json::Error> {
    let value: Value = serde_json::from_str(line.trim())?;
    Ok(parse_record(&value, session_id))
}

fn content_text(content: Option<Value>) -> String {
    match content {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
