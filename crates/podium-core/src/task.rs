//! Task type definitions
//!
//! Task represents the unit of orchestrated work with its status machine
//! and a bounded per-task log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type alias for Task ID
pub type TaskId = String;

/// Maximum log entries retained per task; oldest entries are dropped first.
pub const MAX_TASK_LOG_ENTRIES: usize = 100;

/// Task status machine
///
/// `queued → running → {completed | failed | cancelled}`, with
/// `waiting_approval` reachable from `running` while an asynchronous gate
/// is pending. Terminal statuses are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet dispatched
    Queued,
    /// Handed to an executor
    Running,
    /// Parked on a pending approval item
    WaitingApproval,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled before or during execution
    Cancelled,
}

impl TaskStatus {
    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Check if a terminal status releases dependents instead of cancelling them
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Stable string form used in log and event payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::WaitingApproval => "waiting_approval",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Position of a task inside a linear multi-step chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Identifier shared by every task in the chain
    pub chain_id: String,
    /// Zero-based position in the chain
    pub index: usize,
    /// Total number of tasks in the chain
    pub length: usize,
}

/// One timestamped entry in a task's bounded log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Entry kind, e.g. "status" or "executor"
    pub kind: String,
    pub message: String,
}

/// Task - the unit of orchestrated work
///
/// The scheduler exclusively owns a task's lifecycle; executors report
/// outcomes through the scheduler's transition API and never mutate task
/// state directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for this task
    pub id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Free-text prompt describing the work
    pub prompt: String,
    /// Explicit executor, if the caller supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<String>,
    /// Argument bag handed to the executor
    #[serde(default)]
    pub args: Value,
    /// The single upstream dependency, if any (the relation is a forest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on_task_id: Option<TaskId>,
    /// Chain membership, if created through the chain operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainInfo>,
    /// Approval item this task is parked on, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
    /// Terminal error text, if the task did not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Bounded ordered log of timestamped events
    #[serde(default)]
    pub log: VecDeque<TaskLogEntry>,
}

impl Task {
    /// Create a new task in `queued` status
    pub fn new(prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: TaskStatus::Queued,
            created_at: now,
            updated_at: now,
            prompt: prompt.into(),
            executor_id: None,
            args: Value::Null,
            depends_on_task_id: None,
            chain: None,
            approval_id: None,
            error: None,
            log: VecDeque::new(),
        }
    }

    /// Attempt a status transition.
    ///
    /// Returns `false` without mutating anything when the task is already
    /// terminal: transitions are monotonic toward the terminal set and a
    /// terminal task never re-enters a non-terminal status.
    pub fn transition(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }

    /// Append a log entry, dropping the oldest once the cap is reached
    pub fn push_log(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        if self.log.len() >= MAX_TASK_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(TaskLogEntry {
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
        });
    }
}
