//! Workloads shipped with the binary

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::error::ExecutionResult;
use crate::workload::{Workload, WorkloadContext, WorkloadRegistry};

/// Target URL of the HTTP workloads
pub const HTTP_URL_ENV: &str = "STAMPEDE_HTTP_URL";
/// JSON body sent by `http-post`
pub const HTTP_BODY_ENV: &str = "STAMPEDE_HTTP_BODY";
/// Sleep duration of the `sleep` workload, in milliseconds
pub const SLEEP_MS_ENV: &str = "STAMPEDE_SLEEP_MS";
/// Queue key `enqueue` appends to
pub const ENQUEUE_KEY: &str = "stampede:executions";

const DEFAULT_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_SLEEP_MS: u64 = 100;

// One connection pool for every HTTP unit of the process
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Registry holding every built-in workload
pub fn builtin_registry() -> ExecutionResult<WorkloadRegistry> {
    let mut registry = WorkloadRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

pub fn register_builtins(registry: &mut WorkloadRegistry) -> ExecutionResult<()> {
    registry.register_default::<NoopWorkload>("noop")?;
    registry.register("sleep", || {
        Box::new(SleepWorkload::new(Duration::from_millis(env_or(SLEEP_MS_ENV, DEFAULT_SLEEP_MS))))
    })?;
    registry.register("http-get", || Box::new(HttpGetWorkload::new(env_url())))?;
    registry.register("http-post", || {
        Box::new(HttpPostWorkload::new(
            env_url(),
            std::env::var(HTTP_BODY_ENV).unwrap_or_else(|_| "{}".to_string()),
        ))
    })?;
    registry.register_default::<EnqueueWorkload>("enqueue")?;
    Ok(())
}

fn env_url() -> String {
    std::env::var(HTTP_URL_ENV).unwrap_or_else(|_| DEFAULT_URL.to_string())
}

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Does nothing; measures orchestration overhead
#[derive(Debug, Default)]
pub struct NoopWorkload;

#[async_trait]
impl Workload for NoopWorkload {
    async fn execute(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct SleepWorkload {
    duration: Duration,
}

impl SleepWorkload {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Workload for SleepWorkload {
    async fn execute(&mut self, ctx: &WorkloadContext) -> anyhow::Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => Ok(()),
            _ = ctx.cancelled() => anyhow::bail!("cancelled"),
        }
    }
}

/// Drain a response body, failing on non-success statuses
async fn read_response(response: reqwest::Response) -> anyhow::Result<()> {
    let mut body = response.error_for_status()?.bytes_stream();
    while let Some(chunk) = body.next().await {
        chunk.context("Failed to read response body")?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct HttpGetWorkload {
    url: String,
}

impl HttpGetWorkload {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Workload for HttpGetWorkload {
    async fn execute(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
        let response = HTTP_CLIENT
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?;
        read_response(response).await
    }
}

#[derive(Debug)]
pub struct HttpPostWorkload {
    url: String,
    body: String,
}

impl HttpPostWorkload {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
impl Workload for HttpPostWorkload {
    async fn execute(&mut self, _ctx: &WorkloadContext) -> anyhow::Result<()> {
        let response = HTTP_CLIENT
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(self.body.clone())
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;
        read_response(response).await
    }
}

/// Appends its workload id to the shared queue once per execution
#[derive(Debug, Default)]
pub struct EnqueueWorkload;

#[async_trait]
impl Workload for EnqueueWorkload {
    async fn execute(&mut self, ctx: &WorkloadContext) -> anyhow::Result<()> {
        ctx.queue::<String>(ENQUEUE_KEY)
            .enqueue(&ctx.workload_id.to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_collections::CollectionService;
    use stampede_core::{ExecuteId, WorkerId};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_builtin_names() {
        let registry = builtin_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec!["enqueue", "http-get", "http-post", "noop", "sleep"]
        );
    }

    #[tokio::test]
    async fn test_enqueue_uses_shared_queue() {
        let service = Arc::new(CollectionService::new());
        let ctx = WorkloadContext::new(
            ExecuteId::new(),
            WorkerId::new(),
            service.clone(),
            CancellationToken::new(),
        );

        let mut workload = EnqueueWorkload;
        workload.execute(&ctx).await.unwrap();
        workload.execute(&ctx).await.unwrap();

        let queue = ctx.queue::<String>(ENQUEUE_KEY);
        assert_eq!(queue.count().await.unwrap(), 2);
        assert_eq!(
            queue.to_array().await.unwrap(),
            vec![ctx.workload_id.to_string(), ctx.workload_id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_sleep_returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        let ctx = WorkloadContext::new(
            ExecuteId::new(),
            WorkerId::new(),
            Arc::new(CollectionService::new()),
            cancel.clone(),
        );
        cancel.cancel();

        let mut workload = SleepWorkload::new(Duration::from_secs(60));
        assert!(workload.execute(&ctx).await.is_err());
    }
}
