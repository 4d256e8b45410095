//! Workers as child processes of the master

use async_trait::async_trait;
use stampede_config::ProcessConfig;
use stampede_core::WorkerId;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{ScalingProvider, WorkerLaunch, SHUTDOWN_GRACE};
use crate::error::{ExecutionError, ExecutionResult};
use crate::fail_signal::FailSignal;

/// Environment variable carrying the master address to workers
pub const MASTER_ADDRESS_ENV: &str = "STAMPEDE_MASTER_ADDRESS";

/// Target for lines drained from worker output
const OUTPUT_TARGET: &str = "stampede::worker::output";

/// Spawns the worker binary (by default the current executable) once per
/// worker with `--worker --worker-id <id> --master <addr>`
pub struct ProcessProvider {
    config: ProcessConfig,
    supervisors: TaskTracker,
    kill: CancellationToken,
}

impl ProcessProvider {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            supervisors: TaskTracker::new(),
            kill: CancellationToken::new(),
        }
    }

    fn executable(&self) -> ExecutionResult<PathBuf> {
        match &self.config.executable {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe()
                .map_err(|e| ExecutionError::Spawn(format!("Cannot locate current executable: {}", e))),
        }
    }

    fn command(&self, executable: &PathBuf, worker_id: WorkerId, launch: &WorkerLaunch) -> Command {
        let mut cmd = Command::new(executable);
        cmd.arg("--worker")
            .arg("--worker-id")
            .arg(worker_id.to_string())
            .arg("--master")
            .arg(&launch.master_address)
            .arg("--log-level")
            .arg(launch.log_level.as_str())
            .args(&self.config.extra_args)
            .env(MASTER_ADDRESS_ENV, &launch.master_address)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ScalingProvider for ProcessProvider {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn start_workers(
        &mut self,
        launch: WorkerLaunch,
        fail: FailSignal,
        cancel: CancellationToken,
    ) -> ExecutionResult<()> {
        let executable = self.executable()?;
        self.supervisors = TaskTracker::new();
        self.kill = CancellationToken::new();

        for spawned in 0..launch.worker_count {
            if cancel.is_cancelled() {
                info!(spawned, requested = launch.worker_count, "Run cancelled, no more workers spawned");
                break;
            }
            let worker_id = WorkerId::new();
            let mut child = self
                .command(&executable, worker_id, &launch)
                .spawn()
                .map_err(|e| {
                    ExecutionError::Spawn(format!(
                        "Failed to spawn {}: {}",
                        executable.display(),
                        e
                    ))
                })?;
            let pid = child.id();

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| ExecutionError::Spawn("Failed to get stdout".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| ExecutionError::Spawn("Failed to get stderr".to_string()))?;

            self.supervisors.spawn(drain_lines(
                worker_id,
                "stdout",
                stdout,
                fail.clone(),
                cancel.clone(),
            ));
            self.supervisors.spawn(drain_lines(
                worker_id,
                "stderr",
                stderr,
                fail.clone(),
                cancel.clone(),
            ));
            self.supervisors.spawn(supervise(
                worker_id,
                child,
                fail.clone(),
                cancel.clone(),
                self.kill.clone(),
            ));

            info!(%worker_id, pid = ?pid, "Spawned worker process");
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> ExecutionResult<()> {
        self.supervisors.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.supervisors.wait())
            .await
            .is_err()
        {
            warn!("Worker processes did not exit in time, killing them");
            self.kill.cancel();
            self.supervisors.wait().await;
        }
        Ok(())
    }
}

/// Forward one output stream of a worker into tracing until it closes
async fn drain_lines<R>(
    worker_id: WorkerId,
    stream: &'static str,
    reader: R,
    fail: FailSignal,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(target: OUTPUT_TARGET, %worker_id, stream, "{}", line);
            }
            Ok(None) => break,
            Err(e) if cancel.is_cancelled() => {
                debug!(%worker_id, stream, error = %e, "Output stream closed after cancellation");
                break;
            }
            Err(e) => {
                error!(%worker_id, stream, error = %e, "Failed to read worker output");
                fail.set_error(ExecutionError::Provider(format!(
                    "reading {} of worker {}: {}",
                    stream, worker_id, e
                )));
                break;
            }
        }
    }
}

/// Wait for a worker to exit; kill it when shutdown gives up on it
async fn supervise(
    worker_id: WorkerId,
    mut child: Child,
    fail: FailSignal,
    cancel: CancellationToken,
    kill: CancellationToken,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill.cancelled() => {
            // Already-exited children report an error here; nothing to do
            if let Err(e) = child.kill().await {
                debug!(%worker_id, error = %e, "Worker process was already gone");
            }
            return;
        }
    };

    match status {
        Ok(status) if status.success() => debug!(%worker_id, "Worker process exited"),
        Ok(status) if cancel.is_cancelled() => {
            debug!(%worker_id, %status, "Worker process exited after cancellation")
        }
        Ok(status) => {
            error!(%worker_id, %status, "Worker process exited unexpectedly");
            fail.set_error(ExecutionError::Provider(format!(
                "worker {} exited with {}",
                worker_id, status
            )));
        }
        Err(e) => {
            error!(%worker_id, error = %e, "Failed to wait for worker process");
            fail.set_error(ExecutionError::Provider(format!(
                "waiting for worker {}: {}",
                worker_id, e
            )));
        }
    }
}
