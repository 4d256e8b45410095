//! Master host configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// How worker instances are launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingKind {
    /// Worker runtimes as tasks inside the master process
    InProcess,
    /// One child OS process per worker
    #[default]
    Process,
    /// One pod per worker
    Kubernetes,
}

impl ScalingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingKind::InProcess => "in-process",
            ScalingKind::Process => "process",
            ScalingKind::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for ScalingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-process" | "inprocess" => Ok(ScalingKind::InProcess),
            "process" => Ok(ScalingKind::Process),
            "kubernetes" | "k8s" => Ok(ScalingKind::Kubernetes),
            _ => Err(format!("Unknown scaling kind: {}", s)),
        }
    }
}

/// What happens to the run when a worker disconnects before finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerDisconnectedBehaviour {
    #[default]
    Continue,
    Stop,
}

impl FromStr for WorkerDisconnectedBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(WorkerDisconnectedBehaviour::Continue),
            "stop" => Ok(WorkerDisconnectedBehaviour::Stop),
            _ => Err(format!("Unknown worker disconnected behaviour: {}", s)),
        }
    }
}

/// Master host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Address the worker host binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Host workers dial when it differs from the bind address, e.g. a
    /// pod-reachable name while binding `0.0.0.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<String>,

    /// Port for worker connections; 0 picks a free port
    #[serde(default)]
    pub port: u16,

    /// Scaling provider used when the command line does not choose one
    #[serde(default)]
    pub scaling: ScalingKind,

    /// How long to wait for every worker to connect
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_connect_timeout"
    )]
    pub connect_timeout: Duration,

    #[serde(default)]
    pub worker_disconnected_behaviour: WorkerDisconnectedBehaviour,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            advertise_host: None,
            port: 0,
            scaling: ScalingKind::default(),
            connect_timeout: default_connect_timeout(),
            worker_disconnected_behaviour: WorkerDisconnectedBehaviour::default(),
        }
    }
}

impl MasterConfig {
    /// Rewrite `localhost` to the loopback literal
    pub fn normalize(&mut self) {
        self.host = normalize_host(&self.host);
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", normalize_host(&self.host), self.port)
    }
}

/// Map `localhost` to the IPv4 loopback literal
pub fn normalize_host(host: &str) -> String {
    if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1".to_string()
    } else {
        host.to_string()
    }
}

impl Validatable for MasterConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.host, "host", self.domain_name())?;
        validate_positive(
            self.connect_timeout.as_secs(),
            "connect_timeout",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "master"
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_config_defaults() {
        let config = MasterConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.connect_timeout, Duration::from_secs(600));
        assert_eq!(
            config.worker_disconnected_behaviour,
            WorkerDisconnectedBehaviour::Continue
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_localhost_is_normalized() {
        let mut config = MasterConfig {
            host: "LocalHost".to_string(),
            port: 7070,
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:7070");

        config.normalize();
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_scaling_kind_parsing() {
        assert_eq!("in-process".parse::<ScalingKind>(), Ok(ScalingKind::InProcess));
        assert_eq!("K8S".parse::<ScalingKind>(), Ok(ScalingKind::Kubernetes));
        assert!("docker".parse::<ScalingKind>().is_err());
        assert_eq!(ScalingKind::Process.to_string(), "process");
    }
}
