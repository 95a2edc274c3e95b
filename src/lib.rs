//! Claudia - live monitor for Claude Code sessions
//!
//! This library crate exposes internal modules for integration testing.

pub mod bus;
pub mod config;
pub mod data;
pub mod ingest;
pub mod monitor;
pub mod registry;
pub mod settings;
