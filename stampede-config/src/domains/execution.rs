//! Run execution configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Run execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on a run, from Start until every worker finished
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_timeout")]
    pub timeout: Duration,

    /// Time given to started workloads to tear down after a cancel
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_teardown_grace"
    )]
    pub teardown_grace: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            teardown_grace: default_teardown_grace(),
        }
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;

        if self.teardown_grace >= self.timeout {
            return Err(self.validation_error("teardown_grace must be shorter than timeout"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_teardown_grace() -> Duration {
    Duration::from_secs(30)
}
