//! Podium core types
//!
//! This crate defines the shared vocabulary of the runtime:
//! - Task: the unit of orchestrated work with its status machine
//! - Executor: the uniform contract for side-effecting collaborators
//! - ExecutorSelector: the seam for default executor selection

pub mod executor;
pub mod selector;
pub mod task;

pub use executor::{ExecContext, ExecFailure, ExecOutcome, Executor, ExecutorRegistry};
pub use selector::{ExecutorSelector, Selection};
pub use task::{ChainInfo, Task, TaskId, TaskLogEntry, TaskStatus, MAX_TASK_LOG_ENTRIES};
