//! Run orchestration for Stampede
//!
//! This crate provides:
//! - [`ExecutionCoordinator`]: drives one scenario from `NOT_READY` to
//!   `STOP`/`ERROR` across a set of workers
//! - Scaling providers that bring workers up in-process, as child
//!   processes, or as Kubernetes pods
//! - [`WorkerRuntime`]: the worker side, running workload units against
//!   the master's collection service
//! - The [`Workload`] trait, the name-keyed [`WorkloadRegistry`] and the
//!   built-in workloads

pub mod builtin;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod fail_signal;
pub mod profiler;
pub mod provider;
pub mod worker;
pub mod workload;

// Re-export main types for convenience
pub use builtin::{builtin_registry, register_builtins};
pub use client::{LogForwarder, MasterConnection};
pub use coordinator::{ExecutionCoordinator, ExecutionOutcome, StatusObserver};
pub use error::{ExecutionError, ExecutionResult};
pub use fail_signal::FailSignal;
pub use profiler::{JsonLinesProfiler, LoggingProfiler, ProfileEntry, Profiler};
pub use provider::{
    from_config, InProcessProvider, KubernetesProvider, ProcessProvider, ScalingProvider,
    WorkerLaunch,
};
pub use worker::{run_scenario, WorkerRuntime};
pub use workload::{
    MasterContext, MasterHook, Workload, WorkloadContext, WorkloadFactory, WorkloadRegistry,
};
