//! Persistence collaborator boundary
//!
//! The registry never commits or rolls back: every call receives a
//! `UnitOfWork` from the caller, reads and writes through it, and leaves
//! completion to whoever opened it. `MemoryStore` is the in-process
//! implementation; its commits are last-write-wins per record.

use crate::data::{AssistantMessage, Session, ToolExecution, UserPrompt};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which sessions a listing query returns
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub active_only: bool,
    pub started_after: Option<DateTime<Utc>>,
    pub project_path: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        (!self.active_only || session.is_active)
            && self.started_after.map_or(true, |cutoff| session.started_at >= cutoff)
            && self
                .project_path
                .as_deref()
                .map_or(true, |p| session.project_path == p)
    }
}

/// Reads and writes within one transaction owned by the caller.
///
/// Writes are visible to later reads through the same unit of work.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_session(&mut self, session_id: &str) -> Result<Option<Session>>;

    /// Insert or replace the record keyed by `session.session_id`
    async fn save_session(&mut self, session: Session) -> Result<()>;

    /// Sessions matching `filter`, newest start first
    async fn list_sessions(&mut self, filter: &SessionFilter) -> Result<Vec<Session>>;

    async fn insert_tool_execution(&mut self, execution: ToolExecution) -> Result<()>;

    async fn insert_user_prompt(&mut self, prompt: UserPrompt) -> Result<()>;

    async fn insert_assistant_message(&mut self, message: AssistantMessage) -> Result<()>;

    async fn tool_executions_for(&mut self, session_id: &str) -> Result<Vec<ToolExecution>>;

    async fn count_tool_executions(&mut self) -> Result<u64>;
}

#[derive(Debug, Clone, Default)]
struct Tables {
    sessions: HashMap<String, Session>,
    tool_executions: Vec<ToolExecution>,
    user_prompts: Vec<UserPrompt>,
    assistant_messages: Vec<AssistantMessage>,
}

/// In-process session storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a unit of work.
    ///
    /// Reads see committed state overlaid with this unit's own writes;
    /// nothing is copied up front.
    pub async fn begin(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork {
            store: self.tables.clone(),
            pending: Tables::default(),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    pub async fn tool_executions(&self) -> Vec<ToolExecution> {
        self.tables.lock().await.tool_executions.clone()
    }

    pub async fn user_prompts(&self) -> Vec<UserPrompt> {
        self.tables.lock().await.user_prompts.clone()
    }

    pub async fn assistant_messages(&self) -> Vec<AssistantMessage> {
        self.tables.lock().await.assistant_messages.clone()
    }
}

/// Unit of work over a `MemoryStore`
pub struct MemoryUnitOfWork {
    store: Arc<Mutex<Tables>>,
    /// Sessions saved and child rows appended in this unit of work
    pending: Tables,
}

impl MemoryUnitOfWork {
    /// Apply every write made through this unit of work
    pub async fn commit(self) {
        let mut tables = self.store.lock().await;

        tables.sessions.extend(self.pending.sessions);
        tables.tool_executions.extend(self.pending.tool_executions);
        tables.user_prompts.extend(self.pending.user_prompts);
        tables
            .assistant_messages
            .extend(self.pending.assistant_messages);
    }

    /// Discard every write made through this unit of work
    pub fn rollback(self) {}
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_session(&mut self, session_id: &str) -> Result<Option<Session>> {
        if let Some(session) = self.pending.sessions.get(session_id) {
            return Ok(Some(session.clone()));
        }
        Ok(self.store.lock().await.sessions.get(session_id).cloned())
    }

    async fn save_session(&mut self, session: Session) -> Result<()> {
        self.pending
            .sessions
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn list_sessions(&mut self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let tables = self.store.lock().await;
        let committed = tables
            .sessions
            .values()
            .filter(|s| !self.pending.sessions.contains_key(&s.session_id));
        let mut sessions: Vec<Session> = committed
            .chain(self.pending.sessions.values())
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn insert_tool_execution(&mut self, execution: ToolExecution) -> Result<()> {
        self.pending.tool_executions.push(execution);
        Ok(())
    }

    async fn insert_user_prompt(&mut self, prompt: UserPrompt) -> Result<()> {
        self.pending.user_prompts.push(prompt);
        Ok(())
    }

    async fn insert_assistant_message(&mut self, message: AssistantMessage) -> Result<()> {
        self.pending.assistant_messages.push(message);
        Ok(())
    }

    async fn tool_executions_for(&mut self, session_id: &str) -> Result<Vec<ToolExecution>> {
        let tables = self.store.lock().await;
        Ok(tables
            .tool_executions
            .iter()
            .chain(&self.pending.tool_executions)
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn count_tool_executions(&mut self) -> Result<u64> {
        let committed = self.store.lock().await.tool_executions.len();
        Ok((committed + self.pending.tool_executions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Metadata;

    fn session(id: &str) -> Session {
        Session {
            session_id: id.to_string(),
            project_path: "/p".to_string(),
            project_name: "p".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            is_active: true,
            metadata: Metadata::new(),
            monitor_metadata: Metadata::new(),
            reason: None,
            source: None,
        }
    }

    fn tool(session_id: &str, name: &str) -> ToolExecution {
        ToolExecution {
            id: uuid::Uuid::new_v4(),
            session_id: session_id.to_string(),
            tool_name: name.to_string(),
            parameters: None,
            result: None,
            error: None,
            executed_at: Utc::now(),
            duration_ms: None,
        }
    }

    #[tokio::test]
    async fn test_writes_visible_within_unit_of_work() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await;
        uow.save_session(session("a")).await.unwrap();
        assert!(uow.find_session("a").await.unwrap().is_some());
        // Not visible outside until commit
        assert_eq!(store.session_count().await, 0);
        uow.commit().await;
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await;
        uow.save_session(session("a")).await.unwrap();
        uow.rollback();
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_units_merge_per_record() {
        let store = MemoryStore::new();
        let mut first = store.begin().await;
        let mut second = store.begin().await;
        first.save_session(session("a")).await.unwrap();
        second.save_session(session("b")).await.unwrap();
        first.commit().await;
        second.commit().await;
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_child_reads_combine_committed_and_pending() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await;
        uow.insert_tool_execution(tool("a", "Read")).await.unwrap();
        uow.commit().await;

        let mut uow = store.begin().await;
        uow.insert_tool_execution(tool("a", "Bash")).await.unwrap();
        uow.insert_tool_execution(tool("b", "Edit")).await.unwrap();

        let names: Vec<String> = uow
            .tool_executions_for("a")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.tool_name)
            .collect();
        assert_eq!(names, vec!["Read", "Bash"]);
        assert_eq!(uow.count_tool_executions().await.unwrap(), 3);
        // Pending rows stay out of the store until commit
        assert_eq!(store.tool_executions().await.len(), 1);

        uow.rollback();
        assert_eq!(store.tool_executions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_session_shadows_committed_one() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await;
        uow.save_session(session("a")).await.unwrap();
        uow.commit().await;

        let mut uow = store.begin().await;
        let mut ended = session("a");
        ended.is_active = false;
        uow.save_session(ended).await.unwrap();

        let all = uow.list_sessions(&SessionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
        let active = SessionFilter {
            active_only: true,
            ..Default::default()
        };
        assert!(uow.list_sessions(&active).await.unwrap().is_empty());
    }
}
