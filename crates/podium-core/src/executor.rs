//! Executor contract
//!
//! Executors are black boxes to the scheduler. Invoked by identifier with an
//! argument bag, they perform the actual side effect and report back a
//! uniform success/gate/failure outcome. The scheduler never inspects an
//! executor beyond this shape.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskId;

/// Failure codes an executor may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecFailure {
    /// Policy refusal: the requested application is not on the allowlist
    AppNotAllowed,
    /// The arguments did not describe a runnable action
    InvalidCommand,
    /// The executor is configured off
    ExtensionDisabled,
    /// The action ran and failed
    ExecutionFailed,
}

impl ExecFailure {
    /// Stable string form used in error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecFailure::AppNotAllowed => "app_not_allowed",
            ExecFailure::InvalidCommand => "invalid_command",
            ExecFailure::ExtensionDisabled => "extension_disabled",
            ExecFailure::ExecutionFailed => "execution_failed",
        }
    }
}

impl std::fmt::Display for ExecFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one executor invocation
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// The action ran; the payload is opaque to the scheduler
    Success { payload: Value },
    /// A human gate was created; the task should park until it resolves
    ApprovalRequired {
        approval_id: String,
        message: String,
    },
    /// The action was refused or failed
    Failed { code: ExecFailure, message: String },
}

impl ExecOutcome {
    /// Successful outcome with a payload
    pub fn success(payload: Value) -> Self {
        ExecOutcome::Success { payload }
    }

    /// Failed outcome with a code and message
    pub fn failed(code: ExecFailure, message: impl Into<String>) -> Self {
        ExecOutcome::Failed {
            code,
            message: message.into(),
        }
    }
}

/// Invocation context passed to executors
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Task on whose behalf the executor runs, when driven by the scheduler
    pub task_id: Option<TaskId>,
    /// Skip asynchronous approval gates; set when re-invoking a gated action
    /// after its approval resolved, and by confirm-token surfaces where the
    /// token already is the gate
    pub gate_bypass: bool,
}

impl ExecContext {
    /// Context for a scheduler-driven invocation
    pub fn for_task(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            gate_bypass: false,
        }
    }

    /// Context with approval gates bypassed
    pub fn bypassing_gates(mut self) -> Self {
        self.gate_bypass = true;
        self
    }
}

/// Executor trait - the uniform contract for side-effecting collaborators
#[async_trait]
pub trait Executor: Send + Sync {
    /// Get the executor identifier (must be unique)
    fn id(&self) -> &str;

    /// Get the executor description
    fn description(&self) -> &str;

    /// Perform the action described by `args`
    async fn execute(&self, args: &Value, ctx: &ExecContext) -> ExecOutcome;
}

/// Registry of executors by identifier
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.id().to_string(), executor);
    }

    /// Get an executor by identifier
    pub fn get(&self, id: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(id).cloned()
    }

    /// Get all registered identifiers
    pub fn ids(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticExecutor;

    #[async_trait]
    impl Executor for StaticExecutor {
        fn id(&self) -> &str {
            "static"
        }

        fn description(&self) -> &str {
            "test executor"
        }

        async fn execute(&self, _args: &Value, _ctx: &ExecContext) -> ExecOutcome {
            ExecOutcome::success(json!({"ok": true}))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(StaticExecutor));
        assert!(registry.get("static").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.ids(), vec!["static".to_string()]);
    }

    #[test]
    fn test_exec_failure_codes() {
        assert_eq!(ExecFailure::AppNotAllowed.as_str(), "app_not_allowed");
        assert_eq!(ExecFailure::ExecutionFailed.to_string(), "execution_failed");
    }
}
