//! IPC error types

use thiserror::Error;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// Timeout waiting for response
    #[error("Timeout waiting for response")]
    Timeout,

    /// Message not valid at this point of the conversation
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Transport not connected
    #[error("Transport not connected")]
    NotConnected,
}

impl IpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IpcError::IoError(_) | IpcError::Timeout | IpcError::ConnectionClosed
        )
    }

    /// Check if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::ProtocolVersionMismatch { .. } | IpcError::InvalidMessage(_)
        )
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            IpcError::DeserializationError(err.to_string())
        } else {
            IpcError::SerializationError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(IpcError::IoError("reset by peer".to_string()).is_retryable());
        assert!(IpcError::Timeout.is_retryable());
        assert!(IpcError::ConnectionClosed.is_retryable());
        assert!(!IpcError::ProtocolVersionMismatch { expected: 1, actual: 2 }.is_retryable());
        assert!(!IpcError::InvalidMessage("start before hello".to_string()).is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(IpcError::ProtocolVersionMismatch { expected: 1, actual: 2 }.is_fatal());
        assert!(IpcError::InvalidMessage("start before hello".to_string()).is_fatal());
        assert!(!IpcError::IoError("reset by peer".to_string()).is_fatal());
        assert!(!IpcError::Timeout.is_fatal());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(matches!(IpcError::from(err), IpcError::DeserializationError(_)));
    }
}
