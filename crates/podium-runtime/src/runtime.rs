//! AgentRuntime - wires scheduler, gates, sessions and executors together.
//!
//! The runtime closes the loop the scheduler cannot close alone: resolving
//! an approval re-invokes the gated action with the gate bypassed and
//! propagates its outcome back into the waiting task.

use std::sync::Arc;

use podium_bus::EventHub;
use podium_core::{ExecContext, ExecFailure, ExecOutcome, ExecutorRegistry, TaskStatus};
use podium_gates::{ApprovalItem, ApprovalQueue, ConfirmTokenStore};
use podium_sessions::SessionRegistry;

use crate::actions::ActionService;
use crate::error::RuntimeError;
use crate::scheduler::TaskScheduler;

/// A human decision on a pending approval item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// AgentRuntime - the assembled orchestration core
#[derive(Clone)]
pub struct AgentRuntime {
    pub hub: Arc<EventHub>,
    pub scheduler: TaskScheduler,
    pub approvals: Arc<ApprovalQueue>,
    pub confirm: Arc<ConfirmTokenStore>,
    pub sessions: Arc<SessionRegistry>,
    pub executors: Arc<ExecutorRegistry>,
    pub actions: Arc<ActionService>,
}

impl AgentRuntime {
    /// Resolve a pending approval item.
    ///
    /// Approve re-invokes the original gated action with the gate bypassed
    /// and feeds the outcome into the waiting task; reject cancels the
    /// waiting task. Either way the item's status is decided exactly once.
    pub async fn resolve_approval(
        &self,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<ApprovalItem, RuntimeError> {
        match decision {
            ApprovalDecision::Approve => {
                let item = self.approvals.approve(approval_id).await?;
                let outcome = match self.executors.get(&item.action.executor_id) {
                    Some(executor) => {
                        let mut ctx = ExecContext::default().bypassing_gates();
                        ctx.task_id = item.task_id.clone();
                        executor.execute(&item.action.args, &ctx).await
                    }
                    None => ExecOutcome::failed(
                        ExecFailure::InvalidCommand,
                        format!("executor '{}' is not registered", item.action.executor_id),
                    ),
                };
                if let Some(task_id) = &item.task_id {
                    self.scheduler.apply_outcome(task_id, outcome).await;
                }
                Ok(item)
            }
            ApprovalDecision::Reject => {
                let item = self.approvals.reject(approval_id).await?;
                if let Some(task_id) = &item.task_id {
                    self.scheduler
                        .finish(
                            task_id,
                            TaskStatus::Cancelled,
                            Some(format!("approval '{}' rejected", item.id)),
                            None,
                        )
                        .await;
                }
                Ok(item)
            }
        }
    }
}
