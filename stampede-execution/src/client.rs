//! Worker-side connection to the master
//!
//! After the hello/accepted handshake the connection is split: a writer task
//! drains an outbound channel and a reader task routes collection responses
//! to their waiting callers by correlation id. Every other master message is
//! handed to the worker runtime through the control channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use stampede_collections::{
    CollectionCommand, CollectionError, CollectionReply, CollectionResult, CollectionTransport,
};
use stampede_core::{ExecuteId, ExecuteResult, WorkerId};
use stampede_ipc::{
    CoordinatorMessage, FrameReader, IpcError, IpcTransport, MessageEnvelope, TcpTransport,
    WorkerMessage,
};
use stampede_logging::ForwardedLog;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ExecutionError, ExecutionResult};

/// How long the master has to accept a hello
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_millis(200);

/// Callers waiting on a collection reply; `None` once the connection is gone
type PendingCalls =
    Arc<Mutex<Option<HashMap<Uuid, oneshot::Sender<CollectionResult<CollectionReply>>>>>>;

/// Outbound half of a worker's connection; cheap to clone
#[derive(Clone)]
pub struct MasterConnection {
    worker_id: WorkerId,
    outbound: mpsc::UnboundedSender<CoordinatorMessage>,
    pending: PendingCalls,
}

impl MasterConnection {
    /// Connect, say hello and wait for the master to accept.
    ///
    /// Returns the connection and the receiver of control messages
    /// (`start`, `cancel`, `shutdown`). The receiver closes when the master
    /// goes away.
    pub async fn connect(
        address: &str,
        worker_id: WorkerId,
    ) -> ExecutionResult<(Self, mpsc::UnboundedReceiver<WorkerMessage>)> {
        let mut transport = connect_with_retry(address).await?;

        transport
            .send(&MessageEnvelope::new(CoordinatorMessage::Hello {
                worker_id,
                pid: std::process::id(),
            }))
            .await?;

        let accepted = tokio::time::timeout(HANDSHAKE_TIMEOUT, transport.receive::<WorkerMessage>())
            .await
            .map_err(|_| ExecutionError::Timeout("master did not accept the worker".to_string()))??;
        match accepted.message {
            WorkerMessage::Accepted { worker_id: id } if id == worker_id => {}
            other => {
                return Err(ExecutionError::Ipc(format!(
                    "expected accepted, got {:?}",
                    other
                )))
            }
        }

        let (reader, mut writer) = transport.into_split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<CoordinatorMessage>();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let pending: PendingCalls = Arc::new(Mutex::new(Some(HashMap::new())));

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if writer.send_message(message).await.is_err() {
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        tokio::spawn(read_loop(reader, Arc::clone(&pending), control_tx));

        debug!(%worker_id, address, "Connected to master");
        Ok((
            Self {
                worker_id,
                outbound,
                pending,
            },
            control_rx,
        ))
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn send(&self, message: CoordinatorMessage) -> ExecutionResult<()> {
        self.outbound
            .send(message)
            .map_err(|_| ExecutionError::Ipc("connection to master closed".to_string()))
    }

    pub fn report_result(&self, execute_id: ExecuteId, result: ExecuteResult) -> ExecutionResult<()> {
        self.send(CoordinatorMessage::ExecuteResult { execute_id, result })
    }

    pub fn report_finished(&self, execute_id: ExecuteId, executions: u64) -> ExecutionResult<()> {
        self.send(CoordinatorMessage::Finished {
            execute_id,
            worker_id: self.worker_id,
            executions,
        })
    }

    pub fn report_error(
        &self,
        execute_id: Option<ExecuteId>,
        message: impl Into<String>,
    ) -> ExecutionResult<()> {
        self.send(CoordinatorMessage::Error {
            execute_id,
            message: message.into(),
        })
    }

    /// Relay captured log events to the master until either side closes
    pub fn forward_logs(&self, logs: mpsc::UnboundedReceiver<ForwardedLog>) -> LogForwarder {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        tokio::spawn(relay_logs(logs, flush_rx, self.outbound.clone()));
        LogForwarder { flush: flush_tx }
    }

    /// Collection transport routed over this connection
    pub fn collections(&self) -> Arc<dyn CollectionTransport> {
        Arc::new(RemoteCollections {
            outbound: self.outbound.clone(),
            pending: Arc::clone(&self.pending),
        })
    }
}

/// Handle to the log relay task of one connection
pub struct LogForwarder {
    flush: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl LogForwarder {
    /// Wait until every event captured so far is queued behind earlier
    /// messages on the connection
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.flush.send(ack_tx).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

fn log_message(log: ForwardedLog) -> CoordinatorMessage {
    CoordinatorMessage::Log {
        level: log.level,
        timestamp: log.timestamp,
        target: log.target,
        message: log.message,
    }
}

async fn relay_logs(
    mut logs: mpsc::UnboundedReceiver<ForwardedLog>,
    mut flushes: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    outbound: mpsc::UnboundedSender<CoordinatorMessage>,
) {
    loop {
        tokio::select! {
            log = logs.recv() => match log {
                Some(log) => {
                    if outbound.send(log_message(log)).is_err() {
                        break;
                    }
                }
                None => break,
            },
            Some(ack) = flushes.recv() => {
                while let Ok(log) = logs.try_recv() {
                    if outbound.send(log_message(log)).is_err() {
                        break;
                    }
                }
                let _ = ack.send(());
            }
        }
    }
}

async fn connect_with_retry(address: &str) -> ExecutionResult<TcpTransport> {
    let mut attempt = 1;
    loop {
        match TcpTransport::connect(address).await {
            Ok(transport) => return Ok(transport),
            Err(e) if e.is_retryable() && attempt < CONNECT_ATTEMPTS => {
                debug!(address, attempt, error = %e, "Master not reachable yet, retrying");
                tokio::time::sleep(CONNECT_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn read_loop(
    mut reader: FrameReader<OwnedReadHalf>,
    pending: PendingCalls,
    control: mpsc::UnboundedSender<WorkerMessage>,
) {
    loop {
        let message = match reader.receive::<WorkerMessage>().await {
            Ok(envelope) => envelope.message,
            Err(IpcError::ConnectionClosed) => break,
            Err(e) => {
                debug!(error = %e, "Connection to master failed");
                break;
            }
        };

        match message {
            WorkerMessage::CollectionResponse {
                correlation_id,
                result,
            } => {
                let waiter = pending
                    .lock()
                    .as_mut()
                    .and_then(|calls| calls.remove(&correlation_id));
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => debug!(%correlation_id, "Dropping response with no waiting caller"),
                }
            }
            other => {
                if control.send(other).is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the senders fails every caller still waiting
    pending.lock().take();
}

struct RemoteCollections {
    outbound: mpsc::UnboundedSender<CoordinatorMessage>,
    pending: PendingCalls,
}

#[async_trait]
impl CollectionTransport for RemoteCollections {
    async fn call(&self, key: &str, command: CollectionCommand) -> CollectionResult<CollectionReply> {
        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        match self.pending.lock().as_mut() {
            Some(calls) => {
                calls.insert(correlation_id, tx);
            }
            None => {
                return Err(CollectionError::Transport(
                    "connection to master closed".to_string(),
                ))
            }
        }

        let request = CoordinatorMessage::CollectionRequest {
            correlation_id,
            key: key.to_string(),
            command,
        };
        if self.outbound.send(request).is_err() {
            if let Some(calls) = self.pending.lock().as_mut() {
                calls.remove(&correlation_id);
            }
            return Err(CollectionError::Transport(
                "connection to master closed".to_string(),
            ));
        }

        rx.await.map_err(|_| {
            CollectionError::Transport("connection closed before the master replied".to_string())
        })?
    }
}
