//! Run profiles handed to a storage collaborator at the end of every run

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stampede_core::{ExecuteId, ExecuteStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Summary of one finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub execute_id: ExecuteId,
    pub workload_name: String,
    /// Scenario argument vector, e.g. `request -workloadName x -workerCount 2 ...`
    pub args: Vec<String>,
    pub elapsed: Duration,
    pub status: ExecuteStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Receives profile entries; called fire-and-forget by the coordinator
#[async_trait]
pub trait Profiler: Send + Sync {
    async fn record(&self, entry: ProfileEntry) -> Result<()>;
}

/// Writes each entry to the log
#[derive(Debug, Default)]
pub struct LoggingProfiler;

#[async_trait]
impl Profiler for LoggingProfiler {
    async fn record(&self, entry: ProfileEntry) -> Result<()> {
        info!(
            execute_id = %entry.execute_id,
            workload = %entry.workload_name,
            args = %entry.args.join(" "),
            elapsed_ms = entry.elapsed.as_millis() as u64,
            status = %entry.status,
            "Run profile"
        );
        Ok(())
    }
}

/// Appends each entry as one JSON line to a file
pub struct JsonLinesProfiler {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesProfiler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Profiler for JsonLinesProfiler {
    async fn record(&self, entry: ProfileEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry).context("Failed to serialize profile entry")?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open profile log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write profile entry")?;
        file.flush().await.context("Failed to flush profile log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: ExecuteStatus) -> ProfileEntry {
        ProfileEntry {
            execute_id: ExecuteId::new(),
            workload_name: "sample".to_string(),
            args: vec!["batch".to_string(), "-workloadName".to_string(), "sample".to_string()],
            elapsed: Duration::from_millis(1500),
            status,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.jsonl");
        let profiler = JsonLinesProfiler::new(&path);

        let first = entry(ExecuteStatus::Stop);
        let second = entry(ExecuteStatus::Error);
        profiler.record(first.clone()).await.unwrap();
        profiler.record(second.clone()).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let entries: Vec<ProfileEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries, vec![first, second]);
    }

    #[tokio::test]
    async fn test_logging_profiler_accepts_entries() {
        LoggingProfiler.record(entry(ExecuteStatus::Stop)).await.unwrap();
    }
}
