//! TCP host for worker connections
//!
//! One task per connection. The first message must be `hello`; after the
//! handshake a writer task drains the worker's outbound channel while the
//! connection task reads requests and reports until the worker leaves or the
//! host shuts down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stampede_collections::CollectionService;
use stampede_core::WorkerId;
use stampede_ipc::{CoordinatorMessage, IpcError, TcpTransport, WorkerMessage};
use stampede_logging::emit_forwarded;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::events::MasterEvent;
use crate::hub::WorkerHub;

/// How long a new connection has to introduce itself
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts worker connections and routes their traffic
pub struct MasterHost {
    listener: TcpListener,
    local_addr: SocketAddr,
    hub: Arc<WorkerHub>,
    collections: Arc<CollectionService>,
    events: mpsc::UnboundedSender<MasterEvent>,
}

impl MasterHost {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(
        address: &str,
        collections: Arc<CollectionService>,
        events: mpsc::UnboundedSender<MasterEvent>,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::Bind {
                address: address.to_string(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            hub: Arc::new(WorkerHub::new()),
            collections,
            events,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> Arc<WorkerHub> {
        Arc::clone(&self.hub)
    }

    /// Accept connections until `shutdown` fires, then wait for every
    /// connection task to finish
    pub async fn serve(self, shutdown: CancellationToken) {
        info!(address = %self.local_addr, "Master host listening for workers");
        let connections = TaskTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept worker connection");
                            continue;
                        }
                    };

                    let connection = Connection {
                        hub: Arc::clone(&self.hub),
                        collections: Arc::clone(&self.collections),
                        events: self.events.clone(),
                        shutdown: shutdown.child_token(),
                    };
                    connections.spawn(async move {
                        if let Err(e) = connection.run(stream, peer).await {
                            warn!(%peer, error = %e, "Worker connection rejected");
                        }
                    });
                }
            }
        }

        connections.close();
        connections.wait().await;
        self.hub.clear();
        debug!("Master host stopped");
    }
}

struct Connection {
    hub: Arc<WorkerHub>,
    collections: Arc<CollectionService>,
    events: mpsc::UnboundedSender<MasterEvent>,
    shutdown: CancellationToken,
}

impl Connection {
    async fn run(self, stream: TcpStream, peer: SocketAddr) -> ServerResult<()> {
        let (mut reader, mut writer) = TcpTransport::from_stream(stream)?.into_split();

        let hello = tokio::time::timeout(HELLO_TIMEOUT, reader.receive::<CoordinatorMessage>())
            .await
            .map_err(|_| ServerError::Handshake("timed out waiting for hello".to_string()))??;
        let (worker_id, pid) = match hello.message {
            CoordinatorMessage::Hello { worker_id, pid } => (worker_id, pid),
            other => {
                return Err(ServerError::Handshake(format!(
                    "expected hello, got {:?}",
                    other
                )))
            }
        };

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let writer_task = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let last = matches!(message, WorkerMessage::Shutdown);
                if let Err(e) = writer.send_message(message).await {
                    debug!(%worker_id, error = %e, "Failed to write to worker");
                    break;
                }
                if last {
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        self.hub.register(worker_id, out_tx.clone());
        let _ = out_tx.send(WorkerMessage::Accepted { worker_id });
        info!(%worker_id, pid, %peer, "Worker connected");
        let _ = self.events.send(MasterEvent::WorkerConnected { worker_id, pid });

        let finished = self.read_loop(worker_id, &mut reader, &out_tx).await;

        self.hub.unregister(&worker_id);
        drop(out_tx);
        let _ = writer_task.await;

        debug!(%worker_id, finished, "Worker disconnected");
        let _ = self
            .events
            .send(MasterEvent::WorkerDisconnected { worker_id, finished });
        Ok(())
    }

    /// Returns whether the worker reported `finished` before leaving
    async fn read_loop(
        &self,
        worker_id: WorkerId,
        reader: &mut stampede_ipc::FrameReader<tokio::net::tcp::OwnedReadHalf>,
        out_tx: &mpsc::UnboundedSender<WorkerMessage>,
    ) -> bool {
        let worker_label = worker_id.to_string();
        let mut finished = false;

        loop {
            let received = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = reader.receive::<CoordinatorMessage>() => received,
            };

            let message = match received {
                Ok(envelope) => envelope.message,
                Err(IpcError::ConnectionClosed) => break,
                Err(e) => {
                    warn!(%worker_id, error = %e, "Worker connection failed");
                    break;
                }
            };

            match message {
                CoordinatorMessage::CollectionRequest {
                    correlation_id,
                    key,
                    command,
                } => {
                    let result = self.collections.handle(&key, command);
                    if let Err(ref e) = result {
                        debug!(%worker_id, key = %key, error = %e, "Collection request failed");
                    }
                    let _ = out_tx.send(WorkerMessage::CollectionResponse {
                        correlation_id,
                        result,
                    });
                }
                CoordinatorMessage::ExecuteResult { execute_id, result } => {
                    let _ = self
                        .events
                        .send(MasterEvent::ResultReported { execute_id, result });
                }
                CoordinatorMessage::Log {
                    level,
                    target,
                    message,
                    ..
                } => emit_forwarded(&worker_label, level, &target, &message),
                CoordinatorMessage::Finished {
                    execute_id,
                    executions,
                    ..
                } => {
                    finished = true;
                    let _ = self.events.send(MasterEvent::WorkerFinished {
                        execute_id,
                        worker_id,
                        executions,
                    });
                }
                CoordinatorMessage::Error { message, .. } => {
                    let _ = self.events.send(MasterEvent::subsystem_error(
                        format!("worker {}", worker_id),
                        message,
                    ));
                }
                CoordinatorMessage::Hello { .. } => {
                    warn!(%worker_id, "Ignoring repeated hello");
                }
            }
        }

        finished
    }
}
