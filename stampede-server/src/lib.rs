//! Master host for Stampede
//!
//! Accepts worker connections over TCP, answers distributed collection
//! requests and turns everything else a worker reports into
//! [`MasterEvent`]s for the coordinator.

pub mod error;
pub mod events;
pub mod host;
pub mod hub;

pub use error::{ServerError, ServerResult};
pub use events::MasterEvent;
pub use host::{MasterHost, HELLO_TIMEOUT};
pub use hub::WorkerHub;
