//! Core error types for Stampede

use thiserror::Error;

use crate::types::ExecuteStatus;

/// Core error type for domain-level failures
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scenario construction or validation failed
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// Status transition not permitted by the run state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ExecuteStatus,
        to: ExecuteStatus,
    },

    /// Unknown log level name
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Identifier could not be parsed
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Scenario validation and parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("Unknown scenario mode: {0}")]
    UnknownMode(String),

    #[error("Missing scenario mode")]
    MissingMode,

    #[error("Missing required argument: -{0}")]
    MissingArgument(&'static str),

    #[error("Missing value for argument: {0}")]
    MissingValue(String),

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Argument {flag} is not valid for {mode} mode")]
    NotApplicable { flag: String, mode: String },

    #[error("Invalid value for -{name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0} must be greater than 0")]
    NotPositive(&'static str),

    #[error("Workload name cannot be empty")]
    EmptyWorkloadName,
}
