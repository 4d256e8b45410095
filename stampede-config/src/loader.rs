//! Configuration loading and environment variable handling

use crate::domains::kubernetes::parse_key_values;
use crate::domains::master::{ScalingKind, WorkerDisconnectedBehaviour};
use crate::domains::StampedeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STAMPEDE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StampedeConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: StampedeConfig = serde_yaml::from_str(&content)?;
        self.finish(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<StampedeConfig> {
        self.finish(StampedeConfig::default())
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<StampedeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: StampedeConfig) -> ConfigResult<StampedeConfig> {
        self.apply_env_overrides(&mut config)?;
        config.master.normalize();
        config.validate_all()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut StampedeConfig) -> ConfigResult<()> {
        self.apply_master_overrides(&mut config.master)?;
        self.apply_execution_overrides(&mut config.execution)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_worker_overrides(&mut config.kubernetes)?;
        Ok(())
    }

    /// Apply master config overrides
    fn apply_master_overrides(
        &self,
        config: &mut crate::domains::master::MasterConfig,
    ) -> ConfigResult<()> {
        if let Ok(host) = self.get_env_var("MASTER_HOST") {
            config.host = host;
        }

        if let Ok(host) = self.get_env_var("MASTER_ADVERTISE_HOST") {
            config.advertise_host = Some(host);
        }

        if let Ok(port) = self.get_env_var("MASTER_PORT") {
            config.port = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid MASTER_PORT: {}", e)))?;
        }

        if let Some(timeout) = self.get_seconds("MASTER_CONNECT_TIMEOUT")? {
            config.connect_timeout = timeout;
        }

        if let Ok(behaviour) = self.get_env_var("MASTER_WORKER_DISCONNECTED_BEHAVIOUR") {
            config.worker_disconnected_behaviour = behaviour.parse::<WorkerDisconnectedBehaviour>().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MASTER_WORKER_DISCONNECTED_BEHAVIOUR: {}", e))
            })?;
        }

        if let Ok(scaling) = self.get_env_var("SCALING") {
            config.scaling = scaling
                .parse::<ScalingKind>()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SCALING: {}", e)))?;
        }

        Ok(())
    }

    /// Apply execution config overrides
    fn apply_execution_overrides(
        &self,
        config: &mut crate::domains::execution::ExecutionConfig,
    ) -> ConfigResult<()> {
        if let Some(timeout) = self.get_seconds("EXECUTION_TIMEOUT")? {
            config.timeout = timeout;
        }

        if let Some(grace) = self.get_seconds("EXECUTION_TEARDOWN_GRACE")? {
            config.teardown_grace = grace;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = stampede_core::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        Ok(())
    }

    /// Apply `<PREFIX>_WORKER_*` overrides to the cluster settings
    fn apply_worker_overrides(
        &self,
        config: &mut crate::domains::kubernetes::KubernetesConfig,
    ) -> ConfigResult<()> {
        if let Ok(name) = self.get_env_var("WORKER_NAME") {
            config.name = name;
        }
        if let Ok(image) = self.get_env_var("WORKER_IMAGE_NAME") {
            config.image_name = Some(image);
        }
        if let Ok(tag) = self.get_env_var("WORKER_IMAGE_TAG") {
            config.image_tag = tag;
        }
        if let Ok(secret) = self.get_env_var("WORKER_IMAGE_PULL_SECRET") {
            config.image_pull_secret = Some(secret);
        }
        if let Ok(policy) = self.get_env_var("WORKER_IMAGE_PULL_POLICY") {
            config.image_pull_policy = policy;
        }
        if let Ok(account) = self.get_env_var("WORKER_SERVICEACCOUNT") {
            config.service_account = Some(account);
        }
        if let Ok(selector) = self.get_env_var("WORKER_NODESELECTOR") {
            config.node_selector = parse_key_values(&selector);
        }
        if let Ok(limits) = self.get_env_var("WORKER_RESOURCES_LIMITS") {
            config.resources_limits = parse_key_values(&limits);
        }
        if let Ok(requests) = self.get_env_var("WORKER_RESOURCES_REQUESTS") {
            config.resources_requests = parse_key_values(&requests);
        }
        if let Some(timeout) = self.get_seconds("WORKER_POD_CREATE_TIMEOUT")? {
            config.pod_create_timeout = timeout;
        }
        if let Ok(preserve) = self.get_env_var("WORKER_PRESERVE") {
            config.preserve = preserve
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKER_PRESERVE: {}", e)))?;
        }

        Ok(())
    }

    fn get_seconds(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(value) => {
                let seconds: u64 = value
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))?;
                Ok(Some(Duration::from_secs(seconds)))
            }
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
