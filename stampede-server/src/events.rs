use stampede_core::{ExecuteId, ExecuteResult, WorkerId};

/// Everything the master host reports to the coordinator
#[derive(Debug, Clone)]
pub enum MasterEvent {
    WorkerConnected {
        worker_id: WorkerId,
        pid: u32,
    },
    /// The connection closed; `finished` tells whether `Finished` was seen first
    WorkerDisconnected {
        worker_id: WorkerId,
        finished: bool,
    },
    ResultReported {
        execute_id: ExecuteId,
        result: ExecuteResult,
    },
    WorkerFinished {
        execute_id: ExecuteId,
        worker_id: WorkerId,
        executions: u64,
    },
    /// A background task or a worker failed outside any single execution
    SubsystemError {
        subsystem: String,
        message: String,
    },
}

impl MasterEvent {
    pub fn subsystem_error(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        MasterEvent::SubsystemError {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }
}
