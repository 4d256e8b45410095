//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stampede_collections::{CollectionCommand, CollectionError, CollectionReply};
use stampede_core::{ExecuteId, ExecuteResult, LogLevel, Scenario, WorkerId};
use uuid::Uuid;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the master to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Handshake acknowledgement
    Accepted { worker_id: WorkerId },

    /// Begin the workload lifecycle for a run
    Start {
        execute_id: ExecuteId,
        scenario: Scenario,
    },

    /// Reply to a collection request
    CollectionResponse {
        correlation_id: Uuid,
        result: Result<CollectionReply, CollectionError>,
    },

    /// Stop launching executions; started workloads still tear down
    Cancel { execute_id: ExecuteId },

    /// Close the connection and exit
    Shutdown,
}

/// Messages sent from a worker to the master
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorMessage {
    /// First message on every connection
    Hello { worker_id: WorkerId, pid: u32 },

    /// Distributed collection operation; the key is request metadata
    CollectionRequest {
        correlation_id: Uuid,
        key: String,
        command: CollectionCommand,
    },

    /// One completed execution
    ExecuteResult {
        execute_id: ExecuteId,
        result: ExecuteResult,
    },

    /// Log event forwarded from the worker's subscriber
    Log {
        level: LogLevel,
        timestamp: DateTime<Utc>,
        target: String,
        message: String,
    },

    /// Every workload of the run finished, including teardown
    Finished {
        execute_id: ExecuteId,
        worker_id: WorkerId,
        executions: u64,
    },

    /// The worker could not run the scenario at all
    Error {
        execute_id: Option<ExecuteId>,
        message: String,
    },
}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_collections::{Payload, QueueCommand};

    #[test]
    fn test_message_envelope() {
        let message = CoordinatorMessage::Hello {
            worker_id: WorkerId::new(),
            pid: 4242,
        };

        let envelope = MessageEnvelope::new(message);
        assert_eq!(envelope.protocol_version, IPC_PROTOCOL_VERSION);
        assert!(envelope.is_compatible());

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"hello\""));
        let deserialized: MessageEnvelope<CoordinatorMessage> = serde_json::from_str(&json).unwrap();
        assert!(matches!(deserialized.message, CoordinatorMessage::Hello { pid: 4242, .. }));
    }

    #[test]
    fn test_start_carries_scenario() {
        let scenario = Scenario::request("sample", 2, 3, 4).unwrap();
        let message = WorkerMessage::Start {
            execute_id: ExecuteId::new(),
            scenario: scenario.clone(),
        };

        let json = serde_json::to_string(&MessageEnvelope::new(message)).unwrap();
        let back: MessageEnvelope<WorkerMessage> = serde_json::from_str(&json).unwrap();
        match back.message {
            WorkerMessage::Start { scenario: s, .. } => assert_eq!(s, scenario),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_collection_request_shape() {
        let message = CoordinatorMessage::CollectionRequest {
            correlation_id: Uuid::new_v4(),
            key: "k".to_string(),
            command: CollectionCommand::Queue(QueueCommand::Enqueue {
                item: Payload::encode(&2).unwrap(),
            }),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "collection_request");
        assert_eq!(json["key"], "k");
        assert_eq!(json["command"]["kind"], "queue");
    }

    #[test]
    fn test_collection_error_response_round_trip() {
        let message = WorkerMessage::CollectionResponse {
            correlation_id: Uuid::new_v4(),
            result: Err(CollectionError::DuplicateKey("\"foo\"".to_string())),
        };

        let json = serde_json::to_string(&message).unwrap();
        let back: WorkerMessage = serde_json::from_str(&json).unwrap();
        match back {
            WorkerMessage::CollectionResponse { result, .. } => {
                assert_eq!(result, Err(CollectionError::DuplicateKey("\"foo\"".to_string())));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
