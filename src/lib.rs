//! hurlui - run Hurl scripts and keep their results
//!
//! This library drives the external `hurl` runner for a script, resolves the
//! variables of the selected environment, parses and rehydrates the JSON
//! report, and caches the last result of every script so it can be shown
//! again without re-running.

pub mod artifacts;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod common;
pub mod environment;
pub mod orchestrator;
pub mod report;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, ErrorKind, Result, Warning};
pub use orchestrator::{Invalidation, LastResult, Orchestrator, RunOutcome};
