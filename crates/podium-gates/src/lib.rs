//! Podium gate subsystem
//!
//! Two tiers of safety gates around side-effecting actions:
//! - ApprovalQueue: asynchronous, human-reviewed gates with lazy TTL expiry
//! - ConfirmTokenStore: synchronous dry-run/execute two-phase commit keyed
//!   by a canonical content hash

pub mod approvals;
pub mod confirm;
mod error;

pub use approvals::{
    ApprovalItem, ApprovalQueue, ApprovalStatus, GatedAction, DEFAULT_APPROVAL_CAP,
};
pub use confirm::{
    canonical_hash, ConfirmRejection, ConfirmToken, ConfirmTokenStore,
    DEFAULT_CONFIRM_TTL_SECONDS,
};
pub use error::GateError;
