//! Config-driven executor registry assembly.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use podium_config::ExecutorSpec;
use podium_core::ExecutorRegistry;
use podium_gates::ApprovalQueue;

use crate::builtin::{
    AppLaunchExecutor, EchoExecutor, FileWriteExecutor, HttpRequestExecutor, ShellExecutor,
};

/// Executor construction errors
#[derive(Debug, Error)]
pub enum ExecutorConfigError {
    #[error("unknown executor kind '{kind}' for '{name}'")]
    UnknownKind { name: String, kind: String },
}

/// Shared collaborators handed to gated executors
#[derive(Clone)]
pub struct ExecutorDeps {
    pub approvals: Arc<ApprovalQueue>,
    pub approval_ttl: chrono::Duration,
    pub workspace_root: PathBuf,
}

/// Build a registry from executor specs
pub fn build_registry(
    specs: &[ExecutorSpec],
    deps: &ExecutorDeps,
) -> Result<ExecutorRegistry, ExecutorConfigError> {
    let mut registry = ExecutorRegistry::new();
    for spec in specs {
        match spec.kind.as_str() {
            "echo" => registry.register(Arc::new(EchoExecutor::from_spec(spec))),
            "app_launch" => registry.register(Arc::new(AppLaunchExecutor::from_spec(spec))),
            "shell" => registry.register(Arc::new(ShellExecutor::from_spec(
                spec,
                deps.approvals.clone(),
                deps.approval_ttl,
            ))),
            "http_request" => registry.register(Arc::new(HttpRequestExecutor::from_spec(spec))),
            "file_write" => registry.register(Arc::new(FileWriteExecutor::from_spec(
                spec,
                deps.workspace_root.clone(),
            ))),
            other => {
                return Err(ExecutorConfigError::UnknownKind {
                    name: spec.name.clone(),
                    kind: other.to_string(),
                });
            }
        }
    }
    Ok(registry)
}

/// The default executor set, one of each built-in kind under its kind name
pub fn default_registry(deps: &ExecutorDeps) -> ExecutorRegistry {
    let specs: Vec<ExecutorSpec> = ["echo", "app_launch", "shell", "http_request", "file_write"]
        .iter()
        .map(|kind| ExecutorSpec {
            name: kind.to_string(),
            kind: kind.to_string(),
            description: None,
            config: serde_json::Value::Null,
        })
        .collect();
    build_registry(&specs, deps).unwrap_or_default()
}
