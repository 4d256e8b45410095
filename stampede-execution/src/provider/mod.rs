//! Scaling providers bring worker instances up and tear them down
//!
//! A provider launches exactly the requested number of workers, pointed at
//! the master's address, and drains each instance's output for as long as it
//! lives. Fatal launch or supervision errors go to the run's [`FailSignal`];
//! the first one wins.

pub mod in_process;
pub mod kubernetes;
pub mod process;

pub use in_process::InProcessProvider;
pub use kubernetes::KubernetesProvider;
pub use process::ProcessProvider;

use async_trait::async_trait;
use stampede_config::{ScalingKind, StampedeConfig};
use stampede_core::{LogLevel, Scenario};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionResult;
use crate::fail_signal::FailSignal;
use crate::workload::WorkloadRegistry;

/// How long `shutdown` lets instances exit on their own before killing them
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What a provider needs to launch one run's workers
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    pub scenario: Scenario,
    pub worker_count: u32,
    /// `host:port` the workers connect back to
    pub master_address: String,
    pub log_level: LogLevel,
}

#[async_trait]
pub trait ScalingProvider: Send + Sync {
    /// Name shown in the report's "Scaling Type" line
    fn name(&self) -> &'static str;

    /// Launch `launch.worker_count` workers. Returning an error is
    /// provider-fatal; errors found later while supervising go to `fail`.
    async fn start_workers(
        &mut self,
        launch: WorkerLaunch,
        fail: FailSignal,
        cancel: CancellationToken,
    ) -> ExecutionResult<()>;

    /// Stop supervising and release every instance. Instances that already
    /// exited are not an error.
    async fn shutdown(&mut self) -> ExecutionResult<()>;
}

/// Build the provider selected by `config.master.scaling`
pub fn from_config(
    config: &StampedeConfig,
    registry: Arc<WorkloadRegistry>,
) -> Box<dyn ScalingProvider> {
    match config.master.scaling {
        ScalingKind::InProcess => Box::new(InProcessProvider::new(registry)),
        ScalingKind::Process => Box::new(ProcessProvider::new(config.process.clone())),
        ScalingKind::Kubernetes => Box::new(KubernetesProvider::new(config.kubernetes.clone())),
    }
}
