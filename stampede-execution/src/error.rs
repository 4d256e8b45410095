//! Error types for run execution

use stampede_core::{CoreError, ScenarioError};
use thiserror::Error;

/// Run execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Scenario validation error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Unknown workload: {0}")]
    UnknownWorkload(String),

    #[error("Workload already registered: {0}")]
    DuplicateWorkload(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Cluster API error: {0}")]
    Cluster(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Master host error: {0}")]
    Server(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Invalid execution state: {0}")]
    InvalidState(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Master hook failed: {0}")]
    MasterHook(String),
}

// Convert from core errors
impl From<CoreError> for ExecutionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Scenario(e) => Self::Scenario(e),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

// Convert from IPC errors
impl From<stampede_ipc::IpcError> for ExecutionError {
    fn from(err: stampede_ipc::IpcError) -> Self {
        Self::Ipc(err.to_string())
    }
}

// Convert from master host errors
impl From<stampede_server::ServerError> for ExecutionError {
    fn from(err: stampede_server::ServerError) -> Self {
        Self::Server(err.to_string())
    }
}

// Convert from HTTP client errors
impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Cluster(err.to_string())
    }
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
