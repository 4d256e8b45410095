//! Workers as pods, created through the cluster's REST API
//!
//! The master is expected to run inside the cluster: the namespace, bearer
//! token and CA bundle come from the mounted service account, the endpoint
//! from `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT`. Both can be
//! overridden in the `kubernetes` config section.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};
use stampede_config::KubernetesConfig;
use stampede_core::WorkerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::process::MASTER_ADDRESS_ENV;
use super::{ScalingProvider, WorkerLaunch, SHUTDOWN_GRACE};
use crate::error::{ExecutionError, ExecutionResult};
use crate::fail_signal::FailSignal;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const OUTPUT_TARGET: &str = "stampede::worker::output";
const PHASE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const HEALTH_RETRIES: u32 = 5;
const HEALTH_INTERVAL: Duration = Duration::from_secs(2);

/// Minimal client for the pod endpoints of the core API
struct ClusterApi {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
}

impl ClusterApi {
    async fn resolve(config: &KubernetesConfig) -> ExecutionResult<Self> {
        let base_url = match &config.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    ExecutionError::Cluster(
                        "KUBERNETES_SERVICE_HOST is not set and no api_url is configured"
                            .to_string(),
                    )
                })?;
                let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{}:{}", host, port)
            }
        };

        let namespace = match &config.namespace {
            Some(namespace) => namespace.clone(),
            None => read_service_account_file("namespace")
                .await
                .map(|ns| ns.trim().to_string())
                .unwrap_or_else(|| "default".to_string()),
        };

        let mut builder = reqwest::Client::builder();
        if let Some(token) = read_service_account_file("token").await {
            let mut headers = HeaderMap::new();
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| ExecutionError::Cluster(format!("Invalid service account token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        if let Ok(pem) = tokio::fs::read(format!("{}/ca.crt", SERVICE_ACCOUNT_DIR)).await {
            let certificate = reqwest::Certificate::from_pem(&pem)?;
            builder = builder.add_root_certificate(certificate);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            namespace,
        })
    }

    fn pods_url(&self) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.base_url, self.namespace)
    }

    fn pod_url(&self, name: &str) -> String {
        format!("{}/{}", self.pods_url(), name)
    }

    /// Check the API server answers before creating anything
    async fn wait_healthy(&self, cancel: &CancellationToken) -> ExecutionResult<()> {
        let url = format!("{}/version", self.base_url);
        let mut last_error = String::new();

        for attempt in 1..=HEALTH_RETRIES {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => last_error = format!("status {}", response.status()),
                Err(e) => last_error = e.to_string(),
            }
            debug!(attempt, error = %last_error, "Cluster endpoint not healthy yet");

            tokio::select! {
                _ = tokio::time::sleep(HEALTH_INTERVAL) => {}
                _ = cancel.cancelled() => break,
            }
        }

        Err(ExecutionError::Cluster(format!(
            "Could not reach the cluster API at {}: {}",
            self.base_url, last_error
        )))
    }

    async fn create_pod(&self, manifest: &Value) -> ExecutionResult<()> {
        let response = self.client.post(self.pods_url()).json(manifest).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutionError::Cluster(format!(
                "Pod creation rejected with {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn pod_phase(&self, name: &str) -> ExecutionResult<Option<String>> {
        let response = self.client.get(self.pod_url(name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let pod: Value = response.error_for_status()?.json().await?;
        Ok(pod["status"]["phase"].as_str().map(str::to_string))
    }

    async fn follow_logs(&self, name: &str) -> ExecutionResult<reqwest::Response> {
        let url = format!("{}/log", self.pod_url(name));
        let response = self
            .client
            .get(url)
            .query(&[("follow", "true")])
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }

    /// Delete a pod; one that is already gone counts as deleted
    async fn delete_pod(&self, name: &str) -> ExecutionResult<()> {
        let response = self.client.delete(self.pod_url(name)).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ExecutionError::Cluster(format!(
                "Deleting pod {} failed with {}",
                name, status
            )))
        }
    }
}

async fn read_service_account_file(name: &str) -> Option<String> {
    tokio::fs::read_to_string(format!("{}/{}", SERVICE_ACCOUNT_DIR, name))
        .await
        .ok()
}

/// Pod name for a worker: the configured name plus the id's first block
pub fn pod_name(config: &KubernetesConfig, worker_id: WorkerId) -> String {
    let id = worker_id.to_string();
    let short = id.split('-').next().unwrap_or(&id);
    format!("{}-{}", config.name, short)
}

/// Render the pod manifest for one worker
pub fn pod_manifest(
    config: &KubernetesConfig,
    worker_id: WorkerId,
    launch: &WorkerLaunch,
) -> ExecutionResult<Value> {
    let image = config.image().ok_or_else(|| {
        ExecutionError::Cluster("kubernetes.image_name is required for cluster scaling".to_string())
    })?;

    let mut container = json!({
        "name": config.name,
        "image": image,
        "imagePullPolicy": config.image_pull_policy,
        "args": [
            "--worker",
            "--worker-id", worker_id.to_string(),
            "--master", launch.master_address,
            "--log-level", launch.log_level.as_str(),
        ],
        "env": [
            { "name": MASTER_ADDRESS_ENV, "value": launch.master_address },
        ],
    });

    let mut resources = serde_json::Map::new();
    if !config.resources_limits.is_empty() {
        resources.insert("limits".to_string(), json!(config.resources_limits));
    }
    if !config.resources_requests.is_empty() {
        resources.insert("requests".to_string(), json!(config.resources_requests));
    }
    if !resources.is_empty() {
        container["resources"] = Value::Object(resources);
    }

    let mut spec = json!({
        "restartPolicy": "Never",
        "containers": [container],
    });
    if !config.node_selector.is_empty() {
        spec["nodeSelector"] = json!(config.node_selector);
    }
    if let Some(account) = &config.service_account {
        spec["serviceAccountName"] = json!(account);
    }
    if let Some(secret) = &config.image_pull_secret {
        spec["imagePullSecrets"] = json!([{ "name": secret }]);
    }

    Ok(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": pod_name(config, worker_id),
            "labels": {
                "app": config.name,
                "stampede/worker-id": worker_id.to_string(),
            },
        },
        "spec": spec,
    }))
}

/// Creates one pod per worker and follows each pod's log
pub struct KubernetesProvider {
    config: KubernetesConfig,
    api: Option<Arc<ClusterApi>>,
    pods: Vec<String>,
    followers: TaskTracker,
    kill: CancellationToken,
}

impl KubernetesProvider {
    pub fn new(config: KubernetesConfig) -> Self {
        Self {
            config,
            api: None,
            pods: Vec::new(),
            followers: TaskTracker::new(),
            kill: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl ScalingProvider for KubernetesProvider {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn start_workers(
        &mut self,
        launch: WorkerLaunch,
        fail: FailSignal,
        cancel: CancellationToken,
    ) -> ExecutionResult<()> {
        let api = Arc::new(ClusterApi::resolve(&self.config).await?);
        api.wait_healthy(&cancel).await?;
        self.api = Some(Arc::clone(&api));
        self.followers = TaskTracker::new();
        self.kill = CancellationToken::new();

        info!(
            namespace = %api.namespace,
            name = %self.config.name,
            pods = launch.worker_count,
            "Scaling out worker pods"
        );

        for created in 0..launch.worker_count {
            if cancel.is_cancelled() {
                info!(created, requested = launch.worker_count, "Run cancelled, no more pods created");
                break;
            }
            let worker_id = WorkerId::new();
            let manifest = pod_manifest(&self.config, worker_id, &launch)?;
            let pod = pod_name(&self.config, worker_id);

            api.create_pod(&manifest).await?;
            self.pods.push(pod.clone());
            debug!(%worker_id, pod = %pod, "Created worker pod");

            self.followers.spawn(follow_pod(
                Arc::clone(&api),
                pod,
                worker_id,
                self.config.pod_create_timeout,
                fail.clone(),
                cancel.clone(),
                self.kill.clone(),
            ));
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> ExecutionResult<()> {
        self.followers.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.followers.wait())
            .await
            .is_err()
        {
            debug!("Pod log streams still open, stopping them");
        }
        self.kill.cancel();
        self.followers.wait().await;

        let pods = std::mem::take(&mut self.pods);
        if self.config.preserve {
            info!(pods = pods.len(), "Preserving worker pods");
            return Ok(());
        }

        if let Some(api) = &self.api {
            info!(pods = pods.len(), "Deleting worker pods");
            for pod in pods {
                if let Err(e) = api.delete_pod(&pod).await {
                    warn!(pod = %pod, error = %e, "Failed to delete worker pod");
                }
            }
        }
        Ok(())
    }
}

/// Wait for a pod to start, then drain its log until it ends
async fn follow_pod(
    api: Arc<ClusterApi>,
    pod: String,
    worker_id: WorkerId,
    create_timeout: Duration,
    fail: FailSignal,
    cancel: CancellationToken,
    kill: CancellationToken,
) {
    let deadline = Instant::now() + create_timeout;
    loop {
        match api.pod_phase(&pod).await {
            Ok(Some(phase)) if phase == "Running" || phase == "Succeeded" => break,
            Ok(Some(phase)) if phase == "Failed" => {
                error!(%worker_id, pod = %pod, "Worker pod failed to start");
                fail.set_error(ExecutionError::Cluster(format!("pod {} failed", pod)));
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(pod = %pod, error = %e, "Failed to read pod phase"),
        }

        if Instant::now() >= deadline {
            if !cancel.is_cancelled() {
                error!(%worker_id, pod = %pod, "Worker pod did not start in time");
                fail.set_error(ExecutionError::Timeout(format!(
                    "pod {} not running after {}s",
                    pod,
                    create_timeout.as_secs()
                )));
            }
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(PHASE_POLL_INTERVAL) => {}
            _ = kill.cancelled() => return,
        }
    }

    let response = match api.follow_logs(&pod).await {
        Ok(response) => response,
        Err(e) if cancel.is_cancelled() => {
            debug!(pod = %pod, error = %e, "Pod log unavailable after cancellation");
            return;
        }
        Err(e) => {
            error!(%worker_id, pod = %pod, error = %e, "Cannot follow pod log");
            fail.set_error(ExecutionError::Cluster(format!("log of pod {}: {}", pod, e)));
            return;
        }
    };

    let mut stream = response.bytes_stream();
    let mut pending = Vec::new();
    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            _ = kill.cancelled() => return,
        };
        match chunk {
            Some(Ok(bytes)) => {
                for line in split_lines(&mut pending, &bytes) {
                    debug!(target: OUTPUT_TARGET, %worker_id, pod = %pod, "{}", line);
                }
            }
            Some(Err(e)) if cancel.is_cancelled() => {
                debug!(pod = %pod, error = %e, "Pod log closed after cancellation");
                return;
            }
            Some(Err(e)) => {
                error!(%worker_id, pod = %pod, error = %e, "Pod log stream failed");
                fail.set_error(ExecutionError::Cluster(format!("log of pod {}: {}", pod, e)));
                return;
            }
            None => break,
        }
    }
    if !pending.is_empty() {
        debug!(target: OUTPUT_TARGET, %worker_id, pod = %pod, "{}", String::from_utf8_lossy(&pending));
    }

    if cancel.is_cancelled() {
        return;
    }
    if let Ok(Some(phase)) = api.pod_phase(&pod).await {
        if phase == "Failed" {
            error!(%worker_id, pod = %pod, "Worker pod failed");
            fail.set_error(ExecutionError::Cluster(format!("pod {} failed", pod)));
        }
    }
}

/// Append `chunk` to `pending` and take out every complete line
fn split_lines(pending: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    pending.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(end) = pending.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = pending.drain(..=end).collect();
        let text = String::from_utf8_lossy(&line[..end]);
        lines.push(text.trim_end_matches('\r').to_string());
    }
    lines
}
