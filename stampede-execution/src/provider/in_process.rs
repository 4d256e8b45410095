//! Workers as tokio tasks inside the master process

use async_trait::async_trait;
use stampede_core::WorkerId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::{ScalingProvider, WorkerLaunch, SHUTDOWN_GRACE};
use crate::error::{ExecutionError, ExecutionResult};
use crate::fail_signal::FailSignal;
use crate::worker::WorkerRuntime;
use crate::workload::WorkloadRegistry;

/// Runs each worker runtime on the master's own runtime, talking to the
/// master host over loopback TCP like any other worker
pub struct InProcessProvider {
    registry: Arc<WorkloadRegistry>,
    workers: TaskTracker,
    kill: CancellationToken,
}

impl InProcessProvider {
    pub fn new(registry: Arc<WorkloadRegistry>) -> Self {
        Self {
            registry,
            workers: TaskTracker::new(),
            kill: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl ScalingProvider for InProcessProvider {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn start_workers(
        &mut self,
        launch: WorkerLaunch,
        fail: FailSignal,
        cancel: CancellationToken,
    ) -> ExecutionResult<()> {
        if !self.registry.contains(launch.scenario.workload_name()) {
            return Err(ExecutionError::UnknownWorkload(
                launch.scenario.workload_name().to_string(),
            ));
        }

        self.workers = TaskTracker::new();
        self.kill = CancellationToken::new();
        for spawned in 0..launch.worker_count {
            if cancel.is_cancelled() {
                debug!(spawned, requested = launch.worker_count, "Run cancelled, no more workers started");
                break;
            }
            let runtime = WorkerRuntime::new(WorkerId::new(), Arc::clone(&self.registry));
            let worker_id = runtime.worker_id();
            let address = launch.master_address.clone();
            let fail = fail.clone();
            let cancel = cancel.clone();
            let kill = self.kill.clone();

            // Run cancellation reaches the worker as a `cancel` message; the
            // kill token only fires when shutdown runs out of patience
            self.workers.spawn(async move {
                let outcome = tokio::select! {
                    outcome = runtime.run(&address, None) => outcome,
                    _ = kill.cancelled() => {
                        debug!(%worker_id, "In-process worker stopped");
                        return;
                    }
                };
                match outcome {
                    Err(e) if !cancel.is_cancelled() => {
                        error!(%worker_id, error = %e, "In-process worker failed");
                        fail.set_error(ExecutionError::Worker(format!("{}: {}", worker_id, e)));
                    }
                    Err(e) => debug!(%worker_id, error = %e, "In-process worker ended after cancellation"),
                    Ok(()) => {}
                }
            });
        }

        debug!(workers = self.workers.len(), "Started in-process workers");
        Ok(())
    }

    async fn shutdown(&mut self) -> ExecutionResult<()> {
        self.workers.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.workers.wait())
            .await
            .is_err()
        {
            warn!("In-process workers did not exit in time, stopping them");
            self.kill.cancel();
            self.workers.wait().await;
        }
        Ok(())
    }
}
