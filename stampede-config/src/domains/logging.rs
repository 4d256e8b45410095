//! Logging configuration

use serde::{Deserialize, Serialize};
use stampede_core::LogLevel;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level; `RUST_LOG` directives are used when the level is rejected
    #[serde(default)]
    pub level: LogLevel,

    /// Level handed to spawned workers; the master's level when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_level: Option<LogLevel>,
}

impl LoggingConfig {
    pub fn worker_level(&self) -> LogLevel {
        self.worker_level.unwrap_or(self.level)
    }
}

impl Validatable for LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "logging"
    }
}
