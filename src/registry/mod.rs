//! Session registry
//!
//! Owns the session lifecycle (start, resume, end, timeout) and the child
//! records captured for each session. All state lives behind the
//! `UnitOfWork` handed in by the caller; the registry itself only holds its
//! collaborators and the timeout window.

pub mod embedding;
pub mod lifecycle;
pub mod store;

pub use embedding::{DisabledEmbeddings, EmbeddingProvider, OpenRouterEmbeddings};
pub use store::{MemoryStore, MemoryUnitOfWork, SessionFilter, UnitOfWork};

use crate::data::{
    AssistantMessage, EndReason, Metadata, Session, SessionDetail, SessionSource, SessionStats,
    ToolExecution, UserPrompt,
};
use crate::ingest::DomainEvent;
use chrono::{DateTime, Duration, Utc};
use lifecycle::{transition, SessionState, Signal, Transition};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Key under `monitor_metadata` recording when the id was first seen
pub const FIRST_SEEN_KEY: &str = "first_seen_at";
pub const TRANSCRIPT_PATH_KEY: &str = "transcript_path";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Input for `start_session`
#[derive(Debug, Clone, Default)]
pub struct StartSession {
    pub session_id: String,
    pub project_path: String,
    pub project_name: String,
    pub transcript_path: Option<String>,
    pub runtime_config: Option<Metadata>,
    pub source: Option<SessionSource>,
}

impl StartSession {
    pub fn new(session_id: &str, project_path: &str, project_name: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            project_path: project_path.to_string(),
            project_name: project_name.to_string(),
            ..Default::default()
        }
    }
}

/// Input for `end_session`; `None` fields leave the record untouched
#[derive(Debug, Clone, Default)]
pub struct EndSession {
    pub session_id: String,
    pub reason: Option<EndReason>,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
    pub metadata: Option<Metadata>,
}

impl EndSession {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }
}

/// Input for `record_tool_execution`
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionInput {
    pub session_id: String,
    pub tool_name: Option<String>,
    pub parameters: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Session lifecycle state machine over a caller-supplied unit of work
pub struct SessionRegistry {
    embeddings: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl SessionRegistry {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            embeddings,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a session, or reactivate the existing record for this id
    pub async fn start_session(
        &self,
        uow: &mut dyn UnitOfWork,
        request: StartSession,
    ) -> RegistryResult<Session> {
        let existing = uow.find_session(&request.session_id).await?;
        let now = Utc::now();

        let mut metadata = request.runtime_config.unwrap_or_default();
        if let Some(path) = request.transcript_path {
            metadata.insert(TRANSCRIPT_PATH_KEY.to_string(), Value::String(path));
        }

        let state = SessionState::of(existing.as_ref());
        let session = match (transition(state, Signal::Start), existing) {
            (Transition::Reactivate, Some(mut session)) => {
                tracing::info!(
                    "Session {} resuming (source={:?})",
                    request.session_id,
                    request.source
                );
                session
                    .monitor_metadata
                    .entry(FIRST_SEEN_KEY.to_string())
                    .or_insert_with(|| Value::String(session.started_at.to_rfc3339()));

                session.project_path = request.project_path;
                session.project_name = request.project_name;
                session.started_at = now;
                session.ended_at = None;
                session.reason = None;
                session.is_active = true;
                session.source = request.source;
                session.metadata = metadata;
                session
            }
            _ => {
                let mut monitor_metadata = Metadata::new();
                monitor_metadata.insert(
                    FIRST_SEEN_KEY.to_string(),
                    Value::String(now.to_rfc3339()),
                );

                tracing::info!(
                    "Started tracking session: {} ({}, source={:?})",
                    request.session_id,
                    request.project_name,
                    request.source
                );
                Session {
                    session_id: request.session_id,
                    project_path: request.project_path,
                    project_name: request.project_name,
                    started_at: now,
                    ended_at: None,
                    is_active: true,
                    metadata,
                    monitor_metadata,
                    reason: None,
                    source: request.source,
                }
            }
        };

        uow.save_session(session.clone()).await?;
        Ok(session)
    }

    /// Mark a session ended. Unknown ids fail with `SessionNotFound`.
    pub async fn end_session(
        &self,
        uow: &mut dyn UnitOfWork,
        request: EndSession,
    ) -> RegistryResult<Session> {
        let existing = uow.find_session(&request.session_id).await?;
        let state = SessionState::of(existing.as_ref());

        let mut session = match (transition(state, Signal::End), existing) {
            (Transition::End, Some(session)) => session,
            _ => {
                tracing::error!("Cannot end unknown session: {}", request.session_id);
                return Err(RegistryError::SessionNotFound(request.session_id));
            }
        };

        session.is_active = false;
        session.ended_at = Some(Utc::now());
        session.reason = request.reason;
        if let Some(path) = request.project_path {
            session.project_path = path;
        }
        if let Some(name) = request.project_name {
            session.project_name = name;
        }
        if let Some(metadata) = request.metadata {
            session.metadata = metadata;
        }

        uow.save_session(session.clone()).await?;
        tracing::info!(
            "Ended session: {} (reason={:?})",
            session.session_id,
            session.reason
        );
        Ok(session)
    }

    pub async fn record_tool_execution(
        &self,
        uow: &mut dyn UnitOfWork,
        input: ToolExecutionInput,
    ) -> RegistryResult<ToolExecution> {
        self.require_session(uow, &input.session_id, "record tool execution for")
            .await?;

        let execution = ToolExecution {
            id: Uuid::new_v4(),
            session_id: input.session_id,
            tool_name: input.tool_name.unwrap_or_else(|| "unknown".to_string()),
            parameters: input.parameters,
            result: input.result,
            error: input.error,
            executed_at: Utc::now(),
            duration_ms: input.duration_ms,
        };

        uow.insert_tool_execution(execution.clone()).await?;
        tracing::debug!(
            "Recorded tool {} for session {}",
            execution.tool_name,
            execution.session_id
        );
        Ok(execution)
    }

    pub async fn capture_user_prompt(
        &self,
        uow: &mut dyn UnitOfWork,
        session_id: &str,
        prompt_text: &str,
        metadata: Option<Metadata>,
    ) -> RegistryResult<UserPrompt> {
        self.require_session(uow, session_id, "capture prompt for")
            .await?;

        let embedding = self.embeddings.embed(prompt_text).await;
        let prompt = UserPrompt {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            prompt_text: prompt_text.to_string(),
            metadata: metadata.unwrap_or_default(),
            embedding,
            created_at: Utc::now(),
        };

        uow.insert_user_prompt(prompt.clone()).await?;
        tracing::info!(
            "Captured user prompt for session {} ({} chars, embedding: {})",
            session_id,
            prompt_text.len(),
            prompt.embedding.is_some()
        );
        Ok(prompt)
    }

    pub async fn capture_assistant_message(
        &self,
        uow: &mut dyn UnitOfWork,
        session_id: &str,
        message_text: &str,
        conversation_turn: u32,
        metadata: Option<Metadata>,
    ) -> RegistryResult<AssistantMessage> {
        self.require_session(uow, session_id, "capture message for")
            .await?;

        let embedding = self.embeddings.embed(message_text).await;
        let message = AssistantMessage {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            message_text: message_text.to_string(),
            conversation_turn,
            metadata: metadata.unwrap_or_default(),
            embedding,
            created_at: Utc::now(),
        };

        uow.insert_assistant_message(message.clone()).await?;
        tracing::info!(
            "Captured assistant message for session {} (turn {}, {} chars, embedding: {})",
            session_id,
            conversation_turn,
            message_text.len(),
            message.embedding.is_some()
        );
        Ok(message)
    }

    pub async fn get_session(
        &self,
        uow: &mut dyn UnitOfWork,
        session_id: &str,
    ) -> RegistryResult<Option<SessionDetail>> {
        match uow.find_session(session_id).await? {
            Some(session) => Ok(Some(detail(uow, session).await?)),
            None => Ok(None),
        }
    }

    /// Active sessions, after force-ending any that have timed out
    pub async fn get_active_sessions(
        &self,
        uow: &mut dyn UnitOfWork,
    ) -> RegistryResult<Vec<SessionDetail>> {
        self.check_timeouts(uow).await?;
        let filter = SessionFilter {
            active_only: true,
            ..Default::default()
        };
        self.list(uow, &filter).await
    }

    pub async fn get_recent_sessions(
        &self,
        uow: &mut dyn UnitOfWork,
        hours: i64,
    ) -> RegistryResult<Vec<SessionDetail>> {
        // A window reaching past the representable range covers everything
        let started_after = Duration::try_hours(hours)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        let filter = SessionFilter {
            started_after,
            ..Default::default()
        };
        self.list(uow, &filter).await
    }

    pub async fn get_sessions_by_project(
        &self,
        uow: &mut dyn UnitOfWork,
        project_path: &str,
    ) -> RegistryResult<Vec<SessionDetail>> {
        let filter = SessionFilter {
            project_path: Some(project_path.to_string()),
            ..Default::default()
        };
        self.list(uow, &filter).await
    }

    pub async fn get_session_count(
        &self,
        uow: &mut dyn UnitOfWork,
        active_only: bool,
    ) -> RegistryResult<u64> {
        let filter = SessionFilter {
            active_only,
            ..Default::default()
        };
        Ok(uow.list_sessions(&filter).await?.len() as u64)
    }

    pub async fn get_stats(&self, uow: &mut dyn UnitOfWork) -> RegistryResult<SessionStats> {
        let sessions = uow.list_sessions(&SessionFilter::default()).await?;
        let cutoff_24h = Utc::now() - Duration::hours(24);

        let durations: Vec<f64> = sessions
            .iter()
            .filter_map(Session::duration_seconds)
            .collect();
        let average_session_duration_seconds = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let unique_projects: HashSet<&str> =
            sessions.iter().map(|s| s.project_path.as_str()).collect();

        Ok(SessionStats {
            total_sessions: sessions.len() as u64,
            active_sessions: sessions.iter().filter(|s| s.is_active).count() as u64,
            sessions_last_24h: sessions
                .iter()
                .filter(|s| s.started_at >= cutoff_24h)
                .count() as u64,
            total_tools_executed: uow.count_tool_executions().await?,
            average_session_duration_seconds,
            unique_projects: unique_projects.len() as u64,
        })
    }

    /// Force-end active sessions that started before the timeout window.
    ///
    /// Staleness is judged from the start timestamp, not last activity.
    pub async fn check_timeouts(&self, uow: &mut dyn UnitOfWork) -> RegistryResult<u64> {
        let now = Utc::now();
        let filter = SessionFilter {
            active_only: true,
            ..Default::default()
        };

        let mut timed_out = 0;
        for mut session in uow.list_sessions(&filter).await? {
            if session.ended_at.is_some() || !is_stale(session.started_at, now, self.timeout) {
                continue;
            }
            if transition(SessionState::of(Some(&session)), Signal::Timeout) != Transition::TimeOut
            {
                continue;
            }

            session.is_active = false;
            session.ended_at = Some(now);
            uow.save_session(session).await?;
            timed_out += 1;
        }

        if timed_out > 0 {
            tracing::info!("Timed out {} inactive session(s)", timed_out);
        }
        Ok(timed_out)
    }

    /// Apply an ingested domain event to the registry
    pub async fn apply_event(
        &self,
        uow: &mut dyn UnitOfWork,
        event: &DomainEvent,
    ) -> RegistryResult<()> {
        match event {
            DomainEvent::SessionStart {
                session_id,
                project_path,
                ..
            } => {
                let request =
                    StartSession::new(session_id, project_path, &project_name(project_path));
                self.start_session(uow, request).await?;
            }
            DomainEvent::ToolExecution {
                session_id,
                tool_name,
                parameters,
                ..
            } => {
                let input = ToolExecutionInput {
                    session_id: session_id.clone(),
                    tool_name: Some(tool_name.clone()).filter(|n| !n.is_empty()),
                    parameters: Some(parameters.clone()),
                    ..Default::default()
                };
                self.record_tool_execution(uow, input).await?;
            }
            DomainEvent::UserPrompt {
                session_id,
                content,
                timestamp,
            } => {
                let mut metadata = Metadata::new();
                metadata.insert("source".to_string(), Value::String("transcript".to_string()));
                if let Some(ts) = timestamp {
                    metadata.insert("timestamp".to_string(), Value::String(ts.clone()));
                }
                self.capture_user_prompt(uow, session_id, content, Some(metadata))
                    .await?;
            }
            DomainEvent::SettingsUpdate { .. } => {}
        }
        Ok(())
    }

    async fn require_session(
        &self,
        uow: &mut dyn UnitOfWork,
        session_id: &str,
        action: &str,
    ) -> RegistryResult<Session> {
        match uow.find_session(session_id).await? {
            Some(session) => Ok(session),
            None => {
                tracing::error!("Cannot {} unknown session: {}", action, session_id);
                Err(RegistryError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    async fn list(
        &self,
        uow: &mut dyn UnitOfWork,
        filter: &SessionFilter,
    ) -> RegistryResult<Vec<SessionDetail>> {
        let sessions = uow.list_sessions(filter).await?;
        let mut details = Vec::with_capacity(sessions.len());
        for session in sessions {
            details.push(detail(uow, session).await?);
        }
        Ok(details)
    }
}

async fn detail(uow: &mut dyn UnitOfWork, session: Session) -> RegistryResult<SessionDetail> {
    let executions = uow.tool_executions_for(&session.session_id).await?;
    Ok(SessionDetail::new(session, executions))
}

/// Display name for a project: the last path component
pub fn project_name(project_path: &str) -> String {
    Path::new(project_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| project_path.to_string())
}

/// Start timestamp older than `timeout` relative to `now`
pub fn is_stale(started_at: DateTime<Utc>, now: DateTime<Utc>, timeout: Duration) -> bool {
    now.checked_sub_signed(timeout)
        .is_some_and(|cutoff| started_at < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_is_last_component() {
        assert_eq!(project_name("/home/me/work/app"), "app");
        assert_eq!(project_name("/"), "/");
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        assert!(is_stale(now - Duration::minutes(61), now, Duration::minutes(60)));
        assert!(!is_stale(now - Duration::minutes(59), now, Duration::minutes(60)));
        // Window wider than the calendar never expires anything
        assert!(!is_stale(now, now, Duration::MAX));
    }
}
