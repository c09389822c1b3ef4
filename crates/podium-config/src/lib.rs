//! Podium configuration
//!
//! A single YAML file configures the whole runtime: bus capacities, gate
//! TTLs and caps, scheduler retention, and the executor set. Loading
//! validates eagerly so a bad file fails at startup, not mid-request.

mod loader;
mod types;

pub use loader::{load_config, ConfigError};
pub use types::{
    AppConfig, ApprovalsConfig, BusConfig, ConfirmConfig, ExecutorSpec, PodiumConfig,
    SchedulerConfig, ServerConfig, WorkspaceConfig,
};
