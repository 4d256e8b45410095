//! Domain-specific configuration modules

pub mod execution;
pub mod kubernetes;
pub mod logging;
pub mod master;
pub mod process;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Stampede configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StampedeConfig {
    /// Master host configuration
    #[serde(default)]
    pub master: master::MasterConfig,

    /// Run execution configuration
    #[serde(default)]
    pub execution: execution::ExecutionConfig,

    /// Local-process scaling configuration
    #[serde(default)]
    pub process: process::ProcessConfig,

    /// Cluster scaling configuration
    #[serde(default)]
    pub kubernetes: kubernetes::KubernetesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl StampedeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.master.validate()?;
        self.execution.validate()?;
        self.process.validate()?;
        self.kubernetes.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = StampedeConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
