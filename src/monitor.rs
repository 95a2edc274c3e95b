//! Monitor pipeline
//!
//! Domain events leave the watcher thread over an unbounded channel and are
//! handled here, one at a time, on the async runtime. Each event gets its own
//! unit of work: applied to the registry, committed, then broadcast.

use crate::bus::EventBus;
use crate::config::Config;
use crate::ingest::event::EVENT_SETTINGS_UPDATE;
use crate::ingest::{DomainEvent, TranscriptWatcher};
use crate::registry::embedding::provider_from_config;
use crate::registry::{MemoryStore, RegistryError, SessionRegistry};
use crate::settings::layers::{SettingsLevel, CLAUDE_DIR_NAME};
use crate::settings::SettingsResolver;
use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub struct Monitor {
    watcher: TranscriptWatcher,
    events: UnboundedReceiver<DomainEvent>,
    registry: SessionRegistry,
    store: MemoryStore,
    resolver: SettingsResolver,
    bus: Arc<EventBus>,
}

impl Monitor {
    pub fn new(config: &Config) -> Self {
        let registry = SessionRegistry::new(
            provider_from_config(&config.embeddings),
            config.sessions.timeout(),
        );
        Self::from_parts(
            &config.paths.projects_dir(),
            &config.paths.claude_dir,
            registry,
            SettingsResolver::new(&config.paths.claude_dir),
            Arc::new(EventBus::new(config.bus.subscriber_buffer)),
        )
    }

    pub fn from_parts(
        projects_dir: &Path,
        claude_dir: &Path,
        registry: SessionRegistry,
        resolver: SettingsResolver,
        bus: Arc<EventBus>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            watcher: TranscriptWatcher::new(projects_dir, claude_dir, tx),
            events: rx,
            registry,
            store: MemoryStore::new(),
            resolver,
            bus,
        }
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_running()
    }

    /// Apply one event to the registry and broadcast it.
    ///
    /// Returns the number of subscribers that received the broadcast.
    pub async fn handle_event(&self, event: &DomainEvent) -> usize {
        let mut uow = self.store.begin().await;
        match self.registry.apply_event(&mut uow, event).await {
            Ok(()) => uow.commit().await,
            Err(RegistryError::SessionNotFound(id)) => {
                // Nothing was written; the event is still worth broadcasting
                tracing::warn!("Ignoring {} for unknown session {}", event.event_type(), id);
                uow.rollback();
            }
            Err(e) => {
                tracing::error!("Failed to apply {} event: {}", event.event_type(), e);
                uow.rollback();
            }
        }

        match event {
            DomainEvent::SettingsUpdate { level, path, .. } => {
                self.broadcast_settings_update(event, *level, Path::new(path))
            }
            _ => self.bus.publish(event),
        }
    }

    fn broadcast_settings_update(
        &self,
        event: &DomainEvent,
        level: SettingsLevel,
        path: &Path,
    ) -> usize {
        let project = project_for_settings(level, path);
        let summary = self
            .resolver
            .get_settings_summary(project.as_deref(), None);

        let mut data = match serde_json::to_value(event) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("Failed to serialize settings update for {}", path.display());
                return 0;
            }
        };
        match serde_json::to_value(&summary) {
            Ok(summary) => {
                data.insert("summary".to_string(), summary);
            }
            Err(e) => tracing::warn!("Failed to serialize settings summary: {}", e),
        }

        self.bus.broadcast(EVENT_SETTINGS_UPDATE, Value::Object(data))
    }

    /// Run until `shutdown` resolves, then stop the watcher and drain what it produced
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.watcher.start()?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event).await;
                    }
                    None => break,
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop ingestion first so nothing new arrives, then handle the backlog
    pub async fn shutdown(&mut self) {
        self.watcher.stop();

        let mut drained = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(&event).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!("Handled {} queued event(s) during shutdown", drained);
        }
        tracing::info!("Monitor stopped");
    }
}

/// Project directory a settings file belongs to, for project and local layers
fn project_for_settings(level: SettingsLevel, path: &Path) -> Option<PathBuf> {
    match level {
        SettingsLevel::Project | SettingsLevel::Local => {
            let dir = path.parent()?;
            if dir.file_name().is_some_and(|n| n == CLAUDE_DIR_NAME) {
                dir.parent().map(Path::to_path_buf)
            } else {
                Some(dir.to_path_buf())
            }
        }
        SettingsLevel::Managed | SettingsLevel::User => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_for_settings() {
        assert_eq!(
            project_for_settings(
                SettingsLevel::Project,
                Path::new("/work/app/.claude/settings.json")
            ),
            Some(PathBuf::from("/work/app"))
        );
        assert_eq!(
            project_for_settings(
                SettingsLevel::Local,
                Path::new("/work/app/.claude/settings.local.json")
            ),
            Some(PathBuf::from("/work/app"))
        );
        assert_eq!(
            project_for_settings(SettingsLevel::User, Path::new("/home/me/.claude/settings.json")),
            None
        );
    }
}
