//! Cluster scaling configuration
//!
//! Resolved from the `kubernetes` section and the `STAMPEDE_WORKER_*`
//! environment variables. Map-valued settings (node selector, resource
//! limits and requests) use the `K1=V1;K2=V2` encoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{
    validate_enum_choice, validate_positive, validate_required_string, validate_url, Validatable,
};

const PULL_POLICIES: [&str; 3] = ["Always", "IfNotPresent", "Never"];

/// Cluster scaling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Pod name prefix and value of the `app` label
    #[serde(default = "default_name")]
    pub name: String,

    /// Worker image; required when the cluster provider is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,

    #[serde(default = "default_image_pull_policy")]
    pub image_pull_policy: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default)]
    pub resources_limits: BTreeMap<String, String>,

    #[serde(default)]
    pub resources_requests: BTreeMap<String, String>,

    /// How long a pod may take to reach Running
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_pod_create_timeout"
    )]
    pub pod_create_timeout: Duration,

    /// Keep worker pods after the run
    #[serde(default = "crate::domains::utils::default_false")]
    pub preserve: bool,

    /// Namespace override; the service-account namespace when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// API server override; `KUBERNETES_SERVICE_HOST`/`PORT` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            image_name: None,
            image_tag: default_image_tag(),
            image_pull_secret: None,
            image_pull_policy: default_image_pull_policy(),
            service_account: None,
            node_selector: BTreeMap::new(),
            resources_limits: BTreeMap::new(),
            resources_requests: BTreeMap::new(),
            pod_create_timeout: default_pod_create_timeout(),
            preserve: false,
            namespace: None,
            api_url: None,
        }
    }
}

impl KubernetesConfig {
    /// Full image reference, `name:tag`
    pub fn image(&self) -> Option<String> {
        self.image_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(|name| format!("{}:{}", name, self.image_tag))
    }
}

impl Validatable for KubernetesConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        validate_required_string(&self.image_tag, "image_tag", self.domain_name())?;
        validate_enum_choice(
            &self.image_pull_policy,
            &PULL_POLICIES,
            "image_pull_policy",
            self.domain_name(),
        )?;
        validate_positive(
            self.pod_create_timeout.as_secs(),
            "pod_create_timeout",
            self.domain_name(),
        )?;

        if let Some(ref api_url) = self.api_url {
            validate_url(api_url, "api_url", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "kubernetes"
    }
}

/// Parse `K1=V1;K2=V2`.
///
/// Segments without exactly one `=` or with an empty key are dropped, and
/// so are repeated keys: the first occurrence wins.
pub fn parse_key_values(encoded: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for segment in encoded.split(';') {
        let mut parts = segment.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }
    map
}

fn default_name() -> String {
    "stampede-worker".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_image_pull_policy() -> String {
    "IfNotPresent".to_string()
}

fn default_pod_create_timeout() -> Duration {
    Duration::from_secs(120)
}
