//! IPC transport implementations

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::IpcError;
use crate::protocol::{MessageEnvelope, IPC_PROTOCOL_VERSION};

/// IPC transport trait for different communication mechanisms
#[async_trait]
pub trait IpcTransport: Send + Sync {
    /// Send a message to the other end
    async fn send<T: Serialize + Send + Sync>(
        &mut self,
        message: &MessageEnvelope<T>,
    ) -> Result<(), IpcError>;

    /// Receive a message from the other end
    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), IpcError>;
}

/// Reads newline-delimited envelopes from a byte stream
pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next envelope, checking protocol version compatibility
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.line.clear();
        let read = self.reader.read_line(&mut self.line).await?;
        if read == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        let envelope: MessageEnvelope<T> = serde_json::from_str(self.line.trim_end())
            .map_err(|e| IpcError::DeserializationError(e.to_string()))?;

        if envelope.protocol_version != IPC_PROTOCOL_VERSION {
            return Err(IpcError::ProtocolVersionMismatch {
                expected: IPC_PROTOCOL_VERSION,
                actual: envelope.protocol_version,
            });
        }

        Ok(envelope)
    }
}

/// Writes newline-delimited envelopes to a byte stream
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, message: &MessageEnvelope<T>) -> Result<(), IpcError> {
        let mut json = serde_json::to_string(message)
            .map_err(|e| IpcError::SerializationError(e.to_string()))?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Wrap and send a bare message
    pub async fn send_message<T: Serialize>(&mut self, message: T) -> Result<(), IpcError> {
        self.send(&MessageEnvelope::new(message)).await
    }

    pub async fn shutdown(&mut self) -> Result<(), IpcError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// TCP transport carrying one worker connection
pub struct TcpTransport {
    peer: SocketAddr,
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl TcpTransport {
    /// Connect to the master
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, IpcError> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    /// Wrap an accepted connection
    pub fn from_stream(stream: TcpStream) -> Result<Self, IpcError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read, write) = stream.into_split();
        Ok(Self {
            peer,
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Split into halves so reads and writes can run on separate tasks
    pub fn into_split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl IpcTransport for TcpTransport {
    async fn send<T: Serialize + Send + Sync>(
        &mut self,
        message: &MessageEnvelope<T>,
    ) -> Result<(), IpcError> {
        self.writer.send(message).await
    }

    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.reader.receive().await
    }

    async fn close(&mut self) -> Result<(), IpcError> {
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CoordinatorMessage, WorkerMessage};
    use stampede_core::WorkerId;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = TcpTransport::from_stream(stream).unwrap();
            let hello: MessageEnvelope<CoordinatorMessage> = transport.receive().await.unwrap();
            let worker_id = match hello.message {
                CoordinatorMessage::Hello { worker_id, .. } => worker_id,
                other => panic!("unexpected message: {:?}", other),
            };
            transport
                .send(&MessageEnvelope::new(WorkerMessage::Accepted { worker_id }))
                .await
                .unwrap();
        });

        let worker_id = WorkerId::new();
        let mut client = TcpTransport::connect(addr).await.unwrap();
        client
            .send(&MessageEnvelope::new(CoordinatorMessage::Hello { worker_id, pid: 1 }))
            .await
            .unwrap();

        let reply: MessageEnvelope<WorkerMessage> = client.receive().await.unwrap();
        assert!(matches!(reply.message, WorkerMessage::Accepted { worker_id: id } if id == worker_id));

        server.await.unwrap();
        let closed = client.receive::<WorkerMessage>().await;
        assert!(matches!(closed, Err(IpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let mut envelope = MessageEnvelope::new(WorkerMessage::Shutdown);
        envelope.protocol_version = IPC_PROTOCOL_VERSION + 1;
        writer.send(&envelope).await.unwrap();

        let err = reader.receive::<WorkerMessage>().await.unwrap_err();
        assert!(matches!(err, IpcError::ProtocolVersionMismatch { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_garbage_line_is_a_deserialization_error() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client.write_all(b"not json\n").await.unwrap();
        let err = reader.receive::<WorkerMessage>().await.unwrap_err();
        assert!(matches!(err, IpcError::DeserializationError(_)));
    }
}
