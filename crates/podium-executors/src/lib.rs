//! Podium built-in executors
//!
//! Implementations of the uniform executor contract:
//! - echo: returns its input, useful for wiring checks
//! - app_launch: allowlist-gated application launcher
//! - shell: command runner behind the asynchronous approval gate
//! - http_request: outbound integration calls
//! - file_write: workspace-rooted writes reporting content hashes
//!
//! Plus the keyword-based default selector and the config-driven factory
//! that assembles a registry from executor specs.

pub mod builtin;
pub mod factory;
pub mod selector;

pub use builtin::{
    AppLaunchExecutor, EchoExecutor, FileWriteExecutor, HttpRequestExecutor, ShellExecutor,
};
pub use factory::{build_registry, default_registry, ExecutorConfigError, ExecutorDeps};
pub use selector::KeywordSelector;
