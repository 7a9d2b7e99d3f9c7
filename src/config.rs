//! Fetch configuration, loadable from YAML
//!
//! ```yaml
//! api_url: https://api.openstreetmap.org/api/0.6
//! max_batch_size: 200
//! max_backfill_fetches: 1000
//! missing_dependents: keep_incomplete
//! working_merge: theirs_win
//! store_merge: keep_local_edits
//! ```

use crate::merge::MergePolicy;
use crate::transport::DEFAULT_MAX_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What to do with a line whose points are still incomplete after it was
/// fetched in full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDependentPolicy {
    /// Fail the whole fetch (default)
    #[default]
    Fail,
    /// Complete anyway; the unresolved points join the missing set
    KeepIncomplete,
}

/// Settings for a fetch task and the transports it talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// API root of the remote server
    pub api_url: String,
    pub user_agent: String,
    /// Per-request timeout of the HTTP transport
    pub timeout_secs: u64,
    pub max_batch_size: usize,
    /// Upper bound on single-object fetches during backfill
    pub max_backfill_fetches: usize,
    pub missing_dependents: MissingDependentPolicy,
    /// Policy for merges into the task's working dataset
    pub working_merge: MergePolicy,
    /// Policy for the final merge into the permanent store
    pub store_merge: MergePolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openstreetmap.org/api/0.6".to_string(),
            user_agent: concat!("primfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_backfill_fetches: 1000,
            missing_dependents: MissingDependentPolicy::default(),
            working_merge: MergePolicy::TheirsWin,
            store_merge: MergePolicy::KeepLocalEdits,
        }
    }
}

impl FetchConfig {
    /// Parse from YAML; absent keys keep their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".into()));
        }
        if self.max_backfill_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_backfill_fetches must be at least 1".into(),
            ));
        }
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_missing_dependents(mut self, policy: MissingDependentPolicy) -> Self {
        self.missing_dependents = policy;
        self
    }

    pub fn with_max_backfill_fetches(mut self, limit: usize) -> Self {
        self.max_backfill_fetches = limit;
        self
    }

    pub fn with_store_merge(mut self, policy: MergePolicy) -> Self {
        self.store_merge = policy;
        self
    }

    pub fn with_working_merge(mut self, policy: MergePolicy) -> Self {
        self.working_merge = policy;
        self
    }
}
