//! Master/worker communication for Stampede
//!
//! This crate provides the wire protocol and transport used between the
//! master and its workers: versioned, newline-delimited JSON envelopes over
//! a TCP connection per worker.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::IpcError;
pub use protocol::{CoordinatorMessage, MessageEnvelope, WorkerMessage, IPC_PROTOCOL_VERSION};
pub use transport::{FrameReader, FrameWriter, IpcTransport, TcpTransport};
