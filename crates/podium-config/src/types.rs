//! Configuration types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full Podium configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodiumConfig {
    /// Config schema version; must be greater than 0
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub confirm: ConfirmConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Executor set; an empty list falls back to the built-in defaults
    #[serde(default)]
    pub executors: Vec<ExecutorSpec>,
}

impl Default for PodiumConfig {
    fn default() -> Self {
        Self {
            version: 1,
            app: AppConfig::default(),
            server: ServerConfig::default(),
            bus: BusConfig::default(),
            scheduler: SchedulerConfig::default(),
            approvals: ApprovalsConfig::default(),
            confirm: ConfirmConfig::default(),
            workspace: WorkspaceConfig::default(),
            executors: Vec::new(),
        }
    }
}

/// Application identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "podium".to_string(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, host:port
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Event bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Capacity of the shared history ring
    pub history_capacity: usize,
    /// Events replayed to a new subscriber on bootstrap
    pub replay_limit: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1_000,
            replay_limit: 50,
        }
    }
}

/// Scheduler retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum retained task records; oldest evicted past this
    pub max_tasks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_tasks: 500 }
    }
}

/// Approval queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    /// Maximum stored items; pending items are kept past the cap
    pub cap: usize,
    /// TTL applied to new items, in minutes
    pub default_ttl_minutes: i64,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            cap: 200,
            default_ttl_minutes: 60,
        }
    }
}

/// Confirm token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmConfig {
    /// Token lifetime, in seconds
    pub ttl_seconds: i64,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300 }
    }
}

/// Workspace file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory file-writing executors are confined to
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
        }
    }
}

/// One executor definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSpec {
    /// Unique executor identifier
    pub name: String,
    /// Built-in kind to instantiate
    pub kind: String,
    /// Optional description shown in listings
    #[serde(default)]
    pub description: Option<String>,
    /// Kind-specific settings
    #[serde(default)]
    pub config: Value,
}

impl ExecutorSpec {
    /// The description, or a kind-appropriate fallback
    pub fn description_or(&self, fallback: &str) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}
