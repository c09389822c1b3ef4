//! Configuration loading and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::types::PodiumConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load and validate the full Podium configuration from a YAML file
pub fn load_config(path: &Path) -> Result<PodiumConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: PodiumConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &PodiumConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.bus.history_capacity == 0 {
        return Err(ConfigError::Invalid(
            "bus.history_capacity must be > 0".to_string(),
        ));
    }

    if config.scheduler.max_tasks == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.max_tasks must be > 0".to_string(),
        ));
    }

    if config.approvals.default_ttl_minutes <= 0 {
        return Err(ConfigError::Invalid(
            "approvals.default_ttl_minutes must be > 0".to_string(),
        ));
    }

    if config.confirm.ttl_seconds <= 0 {
        return Err(ConfigError::Invalid(
            "confirm.ttl_seconds must be > 0".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for spec in &config.executors {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "executors[].name must not be empty".to_string(),
            ));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate executor name '{}'",
                spec.name
            )));
        }
        if spec.kind.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "executor '{}' is missing a kind",
                spec.name
            )));
        }
    }

    Ok(())
}
