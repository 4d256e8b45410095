//! Per-run execution context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::scenario::Scenario;
use crate::types::{ExecuteId, ExecuteStatus};

/// State of one coordinator run. Only the status changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    execute_id: ExecuteId,
    status: ExecuteStatus,
    scenario: Scenario,
    created_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            execute_id: ExecuteId::new(),
            status: ExecuteStatus::NotReady,
            scenario,
            created_at: Utc::now(),
        }
    }

    pub fn execute_id(&self) -> ExecuteId {
        self.execute_id
    }

    pub fn status(&self) -> ExecuteStatus {
        self.status
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Advance the status, rejecting moves the state machine does not allow
    pub fn transition(&mut self, next: ExecuteStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_lifecycle() {
        let mut ctx = ExecutionContext::new(Scenario::batch("sample", 1).unwrap());
        assert_eq!(ctx.status(), ExecuteStatus::NotReady);

        ctx.transition(ExecuteStatus::Running).unwrap();
        ctx.transition(ExecuteStatus::Error).unwrap();
        assert_eq!(ctx.status(), ExecuteStatus::Error);

        let err = ctx.transition(ExecuteStatus::Stop).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: ExecuteStatus::Error,
                to: ExecuteStatus::Stop
            }
        ));
    }

    #[test]
    fn test_contexts_get_distinct_ids() {
        let scenario = Scenario::batch("sample", 1).unwrap();
        let a = ExecutionContext::new(scenario.clone());
        let b = ExecutionContext::new(scenario);
        assert_ne!(a.execute_id(), b.execute_id());
    }
}
