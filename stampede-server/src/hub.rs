//! Registry of connected workers and their outbound channels

use parking_lot::RwLock;
use stampede_core::WorkerId;
use stampede_ipc::WorkerMessage;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Connected workers, keyed by id
#[derive(Default)]
pub struct WorkerHub {
    workers: RwLock<HashMap<WorkerId, mpsc::UnboundedSender<WorkerMessage>>>,
}

impl WorkerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker; a reconnect with the same id replaces the old sender
    pub fn register(&self, worker_id: WorkerId, sender: mpsc::UnboundedSender<WorkerMessage>) {
        self.workers.write().insert(worker_id, sender);
    }

    pub fn unregister(&self, worker_id: &WorkerId) -> bool {
        self.workers.write().remove(worker_id).is_some()
    }

    /// Queue a message for one worker; false when it is gone
    pub fn send(&self, worker_id: &WorkerId, message: WorkerMessage) -> bool {
        match self.workers.read().get(worker_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Queue a message for every worker, returning how many accepted it
    pub fn broadcast(&self, message: &WorkerMessage) -> usize {
        self.workers
            .read()
            .values()
            .filter(|sender| sender.send(message.clone()).is_ok())
            .count()
    }

    pub fn connected_count(&self) -> usize {
        self.workers.read().len()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.read().keys().copied().collect()
    }

    pub fn clear(&self) {
        self.workers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_send_broadcast() {
        let hub = WorkerHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = WorkerId::new();
        let b = WorkerId::new();

        hub.register(a, tx_a);
        hub.register(b, tx_b);
        assert_eq!(hub.connected_count(), 2);

        assert!(hub.send(&a, WorkerMessage::Shutdown));
        assert!(matches!(rx_a.try_recv(), Ok(WorkerMessage::Shutdown)));

        // A closed receiver does not count as delivered
        drop(rx_b);
        assert_eq!(hub.broadcast(&WorkerMessage::Shutdown), 1);

        assert!(hub.unregister(&a));
        assert!(!hub.unregister(&a));
        assert!(!hub.send(&a, WorkerMessage::Shutdown));
        assert_eq!(hub.worker_ids(), vec![b]);
    }
}
