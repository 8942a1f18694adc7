use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::transfer::retry::{ActivityOptions, RetryPolicy};

pub const DEFAULT_APPROVAL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACTIVITY_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_ACTIVITY_RETRY_DELAY_SECS: u64 = 2;
pub const DEFAULT_WORKFLOW_DELAY_SECS: u64 = 6;
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;
pub const DEFAULT_VISIBILITY_DELAY_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// How often the log file rolls over
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    #[serde(default)]
    pub rotation: LogRotation,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Timing and retry settings of the transfer orchestration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Bound on the human approval wait
    pub approval_timeout_secs: u64,
    /// Start-to-close timeout of a single ledger call attempt
    pub activity_timeout_secs: u64,
    /// Pause between withdraw and deposit
    pub activity_retry_delay_secs: u64,
    /// Pause before the transfer is reported finished
    pub workflow_delay_secs: u64,
    /// Pause after the instance starts
    pub settle_delay_secs: u64,
    /// Pause after the "Withdraw" checkpoint under ADVANCED_VISIBILITY
    pub visibility_delay_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            approval_timeout_secs: DEFAULT_APPROVAL_TIMEOUT_SECS,
            activity_timeout_secs: DEFAULT_ACTIVITY_TIMEOUT_SECS,
            activity_retry_delay_secs: DEFAULT_ACTIVITY_RETRY_DELAY_SECS,
            workflow_delay_secs: DEFAULT_WORKFLOW_DELAY_SECS,
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
            visibility_delay_secs: DEFAULT_VISIBILITY_DELAY_SECS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn activity_options(&self) -> ActivityOptions {
        ActivityOptions {
            start_to_close_timeout: Duration::from_secs(self.activity_timeout_secs),
            retry_policy: self.retry_policy.clone(),
        }
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn activity_retry_delay(&self) -> Duration {
        Duration::from_secs(self.activity_retry_delay_secs)
    }

    pub fn workflow_delay(&self) -> Duration {
        Duration::from_secs(self.workflow_delay_secs)
    }

    pub fn visibility_delay(&self) -> Duration {
        Duration::from_secs(self.visibility_delay_secs)
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(&format!("config/{}.yaml", env))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
