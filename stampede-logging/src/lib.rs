//! Tracing setup and log capture for Stampede
//!
//! This crate provides:
//! - The log capture pipeline: every event is kept as a [`LogMessage`] and
//!   error-level events are also kept as a [`FailureMessage`]
//! - Subscriber initialisation for the master (console + capture) and for
//!   workers (stderr + forwarding to the master)
//! - Re-emission of forwarded worker events on the master

pub mod capture;
pub mod forward;
pub mod init;

// Re-export main types for convenience
pub use capture::{
    CaptureLayer, CaptureQueue, FailureMessage, LogCapture, LogMessage,
    FAILURE_METHOD_PLACEHOLDER, FAILURE_PATH_PLACEHOLDER,
};
pub use forward::{emit_forwarded, ForwardLayer, ForwardedLog, FORWARDED_TARGET};
pub use init::{init_master_tracing, init_simple_tracing, init_worker_tracing};
