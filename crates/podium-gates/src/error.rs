use thiserror::Error;

use crate::approvals::ApprovalStatus;
use crate::confirm::ConfirmRejection;

/// Gate subsystem errors
#[derive(Debug, Error)]
pub enum GateError {
    #[error("approval not found: {0}")]
    ApprovalNotFound(String),
    #[error("approval already {}", .status.as_str())]
    ApprovalAlreadyResolved { status: ApprovalStatus },
    #[error("confirmation required: {}", .reason.as_str())]
    ConfirmRequired { reason: ConfirmRejection },
}
