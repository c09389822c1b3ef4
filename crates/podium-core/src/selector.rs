//! Default executor selection seam.
//!
//! When a task is created without an explicit executor, the scheduler asks a
//! selector to resolve the free-text prompt to an executor identifier and
//! argument bag. Selection is a default strategy, not a contract: it can be
//! replaced without touching the scheduler.

use serde_json::Value;

/// An inferred executor choice
#[derive(Debug, Clone)]
pub struct Selection {
    /// Identifier of the chosen executor
    pub executor_id: String,
    /// Arguments derived from the prompt
    pub args: Value,
}

/// Strategy for resolving a prompt to an executor
pub trait ExecutorSelector: Send + Sync {
    /// Inspect the prompt and pick an executor, or decline
    fn select(&self, prompt: &str) -> Option<Selection>;
}
