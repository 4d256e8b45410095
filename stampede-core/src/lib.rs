//! Core domain models and types for Stampede
//!
//! This crate contains the fundamental types shared by the master and the
//! workers: identifiers, scenarios, execution results and the per-run
//! execution context. It has minimal dependencies and defines the domain
//! language of the application.

pub mod error;
pub mod execution;
pub mod scenario;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{CoreError, Result, ScenarioError};
pub use execution::ExecutionContext;
pub use scenario::{ModeSettings, Scenario, ScenarioMode};
pub use types::{ExecuteId, ExecuteResult, ExecuteStatus, LogLevel, WorkerId, WorkloadId};
