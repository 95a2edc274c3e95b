//! File watcher for Claude Code session directories and transcripts
//!
//! Uses the notify crate to watch `~/.claude/projects` recursively (plus the
//! user settings directory) and turns filesystem changes into domain events.
//!
//! # Architecture
//!
//! ```text
//! ~/.claude/
//! ├── settings.json              <- modify: settings_update
//! └── projects/                  <- watch root
//!     └── <session_id>/          <- create: session_start
//!         └── <name>.jsonl       <- create: tracked, modify: last line parsed
//! ```
//!
//! notify delivers callbacks on its own thread. The callback only forwards raw
//! notifications to a dedicated worker thread, which reads files and sends
//! finished `DomainEvent` values over a tokio channel. Nothing on either
//! thread touches the registry or the bus.

use super::event::DomainEvent;
use super::parser;
use crate::settings::layers::{infer_level, is_settings_file, SETTINGS_FILENAME};
use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// How often the worker wakes up to check for shutdown
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Translates raw notify events into domain events.
///
/// Holds the transcript bookkeeping; owned by the worker thread.
pub struct FsEventHandler {
    root: PathBuf,
    claude_dir: PathBuf,
    tracked_transcripts: HashSet<PathBuf>,
}

impl FsEventHandler {
    pub fn new(root: &Path, claude_dir: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            claude_dir: claude_dir.to_path_buf(),
            tracked_transcripts: HashSet::new(),
        }
    }

    /// Transcripts seen being created or modified so far
    pub fn tracked_transcripts(&self) -> &HashSet<PathBuf> {
        &self.tracked_transcripts
    }

    /// Handle one notification. Failures are logged and produce no events.
    pub fn handle(&mut self, event: &Event) -> Vec<DomainEvent> {
        let mut out = Vec::new();

        match &event.kind {
            EventKind::Create(kind) => {
                for path in &event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    if is_dir {
                        out.extend(self.session_start(path));
                    } else if is_transcript(path) {
                        self.track(path);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Modify(ModifyKind::Name(_)) => {}
            EventKind::Modify(_) => {
                for path in &event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    if is_transcript(path) {
                        self.track(path);
                        out.extend(self.transcript_update(path));
                    } else if is_settings_file(path) {
                        out.extend(self.settings_change(path));
                    }
                }
            }
            _ => {}
        }

        out
    }

    fn track(&mut self, path: &Path) {
        if self.tracked_transcripts.insert(path.to_path_buf()) {
            tracing::info!("Now monitoring transcript: {}", path.display());
        }
    }

    /// A directory created directly under the root is a new session
    fn session_start(&self, dir: &Path) -> Option<DomainEvent> {
        if dir.parent() != Some(self.root.as_path()) {
            return None;
        }

        let session_id = dir.file_name()?.to_string_lossy().to_string();
        let project_path = self
            .root
            .parent()
            .unwrap_or(&self.root)
            .to_string_lossy()
            .to_string();

        tracing::debug!("Session directory created: {}", session_id);
        Some(DomainEvent::SessionStart {
            session_id,
            project_path,
            timestamp: None,
        })
    }

    /// Re-read the transcript and parse only its final non-empty line
    fn transcript_update(&self, path: &Path) -> Option<DomainEvent> {
        let session_id = path.parent()?.file_name()?.to_string_lossy().to_string();

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to read transcript {}: {}", path.display(), e);
                return None;
            }
        };

        let last_line = last_non_empty_line(&content)?;

        match parser::parse_line(last_line, &session_id) {
            Ok(event) => event,
            Err(e) => {
                // Partial writes are expected while the agent is appending
                tracing::warn!("Malformed JSON in transcript {}: {}", path.display(), e);
                None
            }
        }
    }

    fn settings_change(&self, path: &Path) -> Option<DomainEvent> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to read settings {}: {}", path.display(), e);
                return None;
            }
        };

        let settings = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("Settings {} is not a JSON object", path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Invalid JSON in settings {}: {}", path.display(), e);
                return None;
            }
        };

        Some(DomainEvent::SettingsUpdate {
            level: infer_level(path, &self.claude_dir),
            settings,
            path: path.to_string_lossy().to_string(),
        })
    }
}

fn is_transcript(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TRANSCRIPT_EXTENSION)
}

fn last_non_empty_line(content: &str) -> Option<&str> {
    content.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

struct RunningWatch {
    watcher: RecommendedWatcher,
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Watches the Claude projects directory and emits domain events
pub struct TranscriptWatcher {
    root: PathBuf,
    claude_dir: PathBuf,
    events: UnboundedSender<DomainEvent>,
    running: Option<RunningWatch>,
}

impl TranscriptWatcher {
    /// `root` is the projects directory, `claude_dir` the user settings directory
    pub fn new(root: &Path, claude_dir: &Path, events: UnboundedSender<DomainEvent>) -> Self {
        Self {
            root: root.to_path_buf(),
            claude_dir: claude_dir.to_path_buf(),
            events,
            running: None,
        }
    }

    /// Start watching. A missing root disables the watcher instead of failing.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            tracing::warn!("File monitor already running");
            return Ok(());
        }

        if !self.root.exists() {
            tracing::error!(
                "Projects path does not exist, file monitor disabled: {}",
                self.root.display()
            );
            return Ok(());
        }

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;

        if self.claude_dir.join(SETTINGS_FILENAME).exists() {
            if let Err(e) = watcher.watch(&self.claude_dir, RecursiveMode::NonRecursive) {
                tracing::warn!(
                    "Failed to watch user settings in {}: {}",
                    self.claude_dir.display(),
                    e
                );
            }
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let handler = FsEventHandler::new(&self.root, &self.claude_dir);
        let events = self.events.clone();
        let worker_shutdown = shutdown.clone();

        let worker = thread::Builder::new()
            .name("claudia-fs-watcher".to_string())
            .spawn(move || run_worker(handler, rx, events, worker_shutdown))
            .context("Failed to spawn watcher thread")?;

        self.running = Some(RunningWatch {
            watcher,
            shutdown,
            worker,
        });

        tracing::info!("File monitor started for: {}", self.root.display());
        Ok(())
    }

    /// Stop watching and wait for the worker to drain.
    ///
    /// Once this returns no further events are emitted.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.store(true, Ordering::SeqCst);
        // Dropping the notify watcher releases the OS watch
        drop(running.watcher);
        if running.worker.join().is_err() {
            tracing::error!("File monitor worker panicked");
        }

        tracing::info!("File monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for TranscriptWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut handler: FsEventHandler,
    rx: Receiver<notify::Result<Event>>,
    events: UnboundedSender<DomainEvent>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(SHUTDOWN_POLL_INTERVAL) {
            Ok(Ok(event)) => {
                // Send the whole batch; shutdown is checked between notifications
                for domain_event in handler.handle(&event) {
                    if events.send(domain_event).is_err() {
                        tracing::debug!("Event receiver closed, stopping file monitor worker");
                        return;
                    }
                }
            }
            Ok(Err(e)) => tracing::warn!("File watcher error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_non_empty_line_skips_trailing_blanks() {
        assert_eq!(last_non_empty_line("a\nb\n\n  \n"), Some("b"));
        assert_eq!(last_non_empty_line("\n\n"), None);
        assert_eq!(last_non_empty_line(""), None);
    }

    #[test]
    fn test_is_transcript() {
        assert!(is_transcript(Path::new("/r/s/t.jsonl")));
        assert!(!is_transcript(Path::new("/r/s/t.json")));
    }

    #[test]
    fn test_nested_directory_is_not_a_session() {
        let handler = FsEventHandler::new(Path::new("/r/projects"), Path::new("/r"));
        assert!(handler
            .session_start(Path::new("/r/projects/s1/nested"))
            .is_none());
        assert!(handler.session_start(Path::new("/r/projects/s1")).is_some());
    }

    #[test]
    fn test_worker_forwards_whole_notification() {
        let (tx, rx) = channel();
        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = FsEventHandler::new(Path::new("/r/projects"), Path::new("/r"));

        let event = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/r/projects/s1"))
            .add_path(PathBuf::from("/r/projects/s2"));
        tx.send(Ok(event)).unwrap();
        drop(tx);

        run_worker(handler, rx, events_tx, Arc::new(AtomicBool::new(false)));

        let mut ids = Vec::new();
        while let Ok(DomainEvent::SessionStart { session_id, .. }) = events_rx.try_recv() {
            ids.push(session_id);
        }
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_worker_stops_before_next_notification() {
        let (tx, rx) = channel();
        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = FsEventHandler::new(Path::new("/r/projects"), Path::new("/r"));

        tx.send(Ok(Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/r/projects/s1"))))
            .unwrap();

        run_worker(handler, rx, events_tx, Arc::new(AtomicBool::new(true)));
        assert!(events_rx.try_recv().is_err());
    }
}
