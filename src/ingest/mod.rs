//! Filesystem ingestion: watcher, transcript parser and the events they produce

pub mod event;
pub mod parser;
pub mod watcher;

pub use event::DomainEvent;
pub use watcher::{FsEventHandler, TranscriptWatcher};
