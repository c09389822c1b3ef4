use thiserror::Error;

use podium_core::ExecFailure;
use podium_gates::GateError;

use crate::scheduler::SchedulerError;

/// Runtime-level errors surfaced to the HTTP layer
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("unknown executor: {0}")]
    UnknownExecutor(String),
    #[error("{code}: {message}")]
    Execution { code: ExecFailure, message: String },
}
