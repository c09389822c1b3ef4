//! Podium runtime
//!
//! The orchestration core:
//! - TaskScheduler: task lifecycle, dependency forest, cascade cancellation
//! - AgentRuntime: wires scheduler, gates, sessions and executors together
//! - ActionService: the confirm-token two-phase surface
//! - bootstrap: assemble a runtime from configuration

pub mod actions;
pub mod bootstrap;
mod error;
pub mod runtime;
pub mod scheduler;

pub use actions::{ActionPlan, ActionService};
pub use bootstrap::{build_runtime, BootstrapError};
pub use error::RuntimeError;
pub use runtime::{AgentRuntime, ApprovalDecision};
pub use scheduler::{
    ChainTaskSpec, ChainView, CreateTaskRequest, SchedulerError, SchedulerOptions, TaskScheduler,
};
