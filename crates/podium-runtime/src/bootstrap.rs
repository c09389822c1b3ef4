//! Bootstrap helpers for assembling a runtime from a single config.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use podium_bus::EventHub;
use podium_config::{load_config, ConfigError, PodiumConfig};
use podium_executors::{build_registry, default_registry, ExecutorConfigError, ExecutorDeps, KeywordSelector};
use podium_gates::{ApprovalQueue, ConfirmTokenStore};
use podium_sessions::SessionRegistry;

use crate::actions::ActionService;
use crate::runtime::AgentRuntime;
use crate::scheduler::{SchedulerOptions, TaskScheduler};

/// Runtime bootstrap errors
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("executor config error: {0}")]
    Executors(#[from] ExecutorConfigError),
}

/// Load a config file and build the runtime from it
pub fn runtime_from_config_path(path: &Path) -> Result<AgentRuntime, BootstrapError> {
    let config = load_config(path)?;
    build_runtime(&config)
}

/// Build the full runtime from a validated config
pub fn build_runtime(config: &PodiumConfig) -> Result<AgentRuntime, BootstrapError> {
    let hub = Arc::new(EventHub::with_capacity(
        config.bus.history_capacity,
        config.bus.replay_limit,
    ));
    let approvals = Arc::new(ApprovalQueue::with_cap(hub.clone(), config.approvals.cap));
    let confirm = Arc::new(ConfirmTokenStore::with_ttl(chrono::Duration::seconds(
        config.confirm.ttl_seconds,
    )));
    let sessions = Arc::new(SessionRegistry::new(hub.clone()));

    let deps = ExecutorDeps {
        approvals: approvals.clone(),
        approval_ttl: chrono::Duration::minutes(config.approvals.default_ttl_minutes),
        workspace_root: PathBuf::from(&config.workspace.root),
    };
    let executors = Arc::new(if config.executors.is_empty() {
        default_registry(&deps)
    } else {
        build_registry(&config.executors, &deps)?
    });

    let scheduler = TaskScheduler::with_options(
        hub.clone(),
        executors.clone(),
        Arc::new(KeywordSelector::new()),
        SchedulerOptions {
            max_tasks: config.scheduler.max_tasks,
        },
    );
    let actions = Arc::new(ActionService::new(
        confirm.clone(),
        executors.clone(),
        hub.clone(),
    ));

    Ok(AgentRuntime {
        hub,
        scheduler,
        approvals,
        confirm,
        sessions,
        executors,
        actions,
    })
}
