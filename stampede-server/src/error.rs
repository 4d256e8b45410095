//! Master host error types

use stampede_ipc::IpcError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Handshake failed: {0}")]
    Handshake(String),
}
