//! Log capture pipeline
//!
//! A single append point receives every log event. All events land in the
//! log queue; events at error severity are duplicated into the failure
//! queue, which the coordinator inspects at the end of a run.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stampede_core::LogLevel;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Placeholder method recorded on failure entries
pub const FAILURE_METHOD_PLACEHOLDER: &str = "TBD";

/// Placeholder path recorded on failure entries
pub const FAILURE_PATH_PLACEHOLDER: &str = "/PATH/LOAD/TEST";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailureMessage {
    pub timestamp: DateTime<Utc>,
    /// Not derived from structured context yet; always the placeholder
    pub method: String,
    /// Not derived from structured context yet; always the placeholder
    pub path: String,
    pub message: String,
}

/// Unbounded, insertion-ordered queue shared between producers and readers
#[derive(Debug)]
pub struct CaptureQueue<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for CaptureQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CaptureQueue<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T: Clone + Default> CaptureQueue<T> {
    pub fn push(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Snapshot copy; does not drain
    pub fn get_all(&self) -> Vec<T> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Pop the oldest entry, or the default value when empty
    pub fn remove_one(&self) -> T {
        self.inner.lock().pop_front().unwrap_or_default()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// The two capture queues behind one append point
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    logs: CaptureQueue<LogMessage>,
    failures: CaptureQueue<FailureMessage>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, level: LogLevel, timestamp: DateTime<Utc>, message: impl Into<String>) {
        let message = message.into();
        if level.is_failure() {
            self.failures.push(FailureMessage {
                timestamp,
                method: FAILURE_METHOD_PLACEHOLDER.to_string(),
                path: FAILURE_PATH_PLACEHOLDER.to_string(),
                message: message.clone(),
            });
        }
        self.logs.push(LogMessage { timestamp, message });
    }

    pub fn logs(&self) -> &CaptureQueue<LogMessage> {
        &self.logs
    }

    pub fn failures(&self) -> &CaptureQueue<FailureMessage> {
        &self.failures
    }
}

pub(crate) fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

/// Renders an event's message followed by its other fields
#[derive(Default)]
pub(crate) struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    pub(crate) fn render(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// `tracing` layer feeding every event into a [`LogCapture`]
pub struct CaptureLayer {
    capture: LogCapture,
}

impl CaptureLayer {
    pub fn new(capture: LogCapture) -> Self {
        Self { capture }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.capture
            .append(level_of(event.metadata().level()), Utc::now(), visitor.render());
    }
}
