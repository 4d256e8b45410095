//! Worker-side forwarding of log events to the master

use chrono::{DateTime, Utc};
use stampede_core::LogLevel;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::capture::{level_of, MessageVisitor};

/// Target used when the master re-emits a worker's event
pub const FORWARDED_TARGET: &str = "stampede::worker";

/// A log event captured on a worker, ready to be sent to the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedLog {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub message: String,
}

/// `tracing` layer pushing events into a channel drained by the worker's
/// connection task.
///
/// The drain task must not log per message it sends, or every send would
/// feed another event into the channel. Targets registered with
/// [`ForwardLayer::exclude_target`] are never forwarded.
pub struct ForwardLayer {
    sender: UnboundedSender<ForwardedLog>,
    excluded: Vec<String>,
}

impl ForwardLayer {
    pub fn new(sender: UnboundedSender<ForwardedLog>) -> Self {
        Self {
            sender,
            excluded: Vec::new(),
        }
    }

    pub fn exclude_target(mut self, prefix: impl Into<String>) -> Self {
        self.excluded.push(prefix.into());
        self
    }

    fn is_excluded(&self, target: &str) -> bool {
        self.excluded.iter().any(|prefix| target.starts_with(prefix.as_str()))
    }
}

impl<S: Subscriber> Layer<S> for ForwardLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_excluded(metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // The receiver is gone once the connection closes; late events are dropped
        let _ = self.sender.send(ForwardedLog {
            level: level_of(metadata.level()),
            timestamp: Utc::now(),
            target: metadata.target().to_string(),
            message: visitor.render(),
        });
    }
}

/// Re-emit an event received from a worker into the master's subscriber,
/// so the capture pipeline sees it like a local event
pub fn emit_forwarded(worker: &str, level: LogLevel, target: &str, message: &str) {
    match level {
        LogLevel::Trace => {
            tracing::trace!(target: FORWARDED_TARGET, worker = %worker, origin = %target, "{}", message)
        }
        LogLevel::Debug => {
            tracing::debug!(target: FORWARDED_TARGET, worker = %worker, origin = %target, "{}", message)
        }
        LogLevel::Info => {
            tracing::info!(target: FORWARDED_TARGET, worker = %worker, origin = %target, "{}", message)
        }
        LogLevel::Warn => {
            tracing::warn!(target: FORWARDED_TARGET, worker = %worker, origin = %target, "{}", message)
        }
        LogLevel::Error => {
            tracing::error!(target: FORWARDED_TARGET, worker = %worker, origin = %target, "{}", message)
        }
    }
}
