//! Core type definitions for Stampede

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId(format!("{}: {}", s, e)))
            }
        }
    };
}

uuid_id!(
    /// Identifier of one spawned worker process or pod
    WorkerId
);

uuid_id!(
    /// Identifier of one logical workload unit inside a worker; never reused
    WorkloadId
);

uuid_id!(
    /// Identifier of one coordinator run
    ExecuteId
);

/// Run status as observed by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecuteStatus {
    #[default]
    NotReady,
    Running,
    Stop,
    Error,
}

impl ExecuteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteStatus::NotReady => "NOT_READY",
            ExecuteStatus::Running => "RUNNING",
            ExecuteStatus::Stop => "STOP",
            ExecuteStatus::Error => "ERROR",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecuteStatus::Stop | ExecuteStatus::Error)
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: ExecuteStatus) -> bool {
        matches!(
            (self, next),
            (ExecuteStatus::NotReady, ExecuteStatus::Running)
                | (ExecuteStatus::Running, ExecuteStatus::Stop)
                | (ExecuteStatus::Running, ExecuteStatus::Error)
        )
    }
}

impl fmt::Display for ExecuteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single execution inside a workload unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub worker_id: WorkerId,
    pub workload_id: WorkloadId,
    /// Zero-based execution index within the workload
    pub execution_no: u32,
    pub elapsed: Duration,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl ExecuteResult {
    /// Create a successful result
    pub fn success(
        worker_id: WorkerId,
        workload_id: WorkloadId,
        execution_no: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            worker_id,
            workload_id,
            execution_no,
            elapsed,
            has_error: false,
            error_message: None,
        }
    }

    /// Create a failed result
    pub fn failure(
        worker_id: WorkerId,
        workload_id: WorkloadId,
        execution_no: u32,
        elapsed: Duration,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            worker_id,
            workload_id,
            execution_no,
            elapsed,
            has_error: true,
            error_message: Some(error_message.into()),
        }
    }

    /// Elapsed time in fractional milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Log levels carried across the worker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Whether entries at this level count as failures
    pub fn is_failure(&self) -> bool {
        *self >= LogLevel::Error
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CoreError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(ExecuteStatus::NotReady.can_transition_to(ExecuteStatus::Running));
        assert!(ExecuteStatus::Running.can_transition_to(ExecuteStatus::Stop));
        assert!(ExecuteStatus::Running.can_transition_to(ExecuteStatus::Error));
        assert!(!ExecuteStatus::NotReady.can_transition_to(ExecuteStatus::Stop));
        assert!(!ExecuteStatus::Stop.can_transition_to(ExecuteStatus::Error));
        assert!(!ExecuteStatus::Error.can_transition_to(ExecuteStatus::Running));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ExecuteStatus::NotReady).unwrap();
        assert_eq!(json, "\"NOT_READY\"");
        assert_eq!(ExecuteStatus::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(LogLevel::Error.is_failure());
        assert!(!LogLevel::Warn.is_failure());
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_id_parse() {
        let id = WorkerId::new();
        let parsed: WorkerId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<WorkloadId>().is_err());
    }

    #[test]
    fn test_workload_ids_are_fresh() {
        assert_ne!(WorkloadId::new(), WorkloadId::new());
    }

    #[test]
    fn test_result_constructors() {
        let ok = ExecuteResult::success(
            WorkerId::new(),
            WorkloadId::new(),
            0,
            Duration::from_millis(15),
        );
        assert!(!ok.has_error);
        assert_eq!(ok.elapsed_ms(), 15.0);

        let failed = ExecuteResult::failure(
            WorkerId::new(),
            WorkloadId::new(),
            1,
            Duration::from_millis(3),
            "boom",
        );
        assert!(failed.has_error);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
    }
}
