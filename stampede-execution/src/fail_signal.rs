//! Single-fire, run-wide fatal error cell

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;

/// Shared by the coordinator and the scaling provider. The first error wins;
/// later calls to [`FailSignal::set_error`] are ignored.
#[derive(Debug, Clone, Default)]
pub struct FailSignal {
    inner: Arc<FailInner>,
}

#[derive(Debug, Default)]
struct FailInner {
    error: Mutex<Option<ExecutionError>>,
    fired: CancellationToken,
}

impl FailSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the run's fatal error; `false` if one was already recorded
    pub fn set_error(&self, error: ExecutionError) -> bool {
        {
            let mut slot = self.inner.error.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(error);
        }
        self.inner.fired.cancel();
        true
    }

    pub fn is_set(&self) -> bool {
        self.inner.fired.is_cancelled()
    }

    pub fn error(&self) -> Option<ExecutionError> {
        self.inner.error.lock().clone()
    }

    /// Resolves once the signal has fired
    pub async fn wait(&self) {
        self.inner.fired.cancelled().await
    }
}
