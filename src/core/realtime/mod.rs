use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

/// Per-subscriber buffer depth. A subscriber that falls more than this many
/// lines behind starts losing messages rather than slowing the producer.
const SUBSCRIBER_BUFFER: usize = 100;

/// In-memory pub/sub for live execution output, keyed by execution id.
///
/// Delivery is best-effort: publishing never blocks, and a full subscriber
/// channel silently drops that message for that subscriber only.
pub struct LogBroker {
    subscribers: Mutex<HashMap<i64, Vec<mpsc::Sender<String>>>>,
}

impl LogBroker {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscriber for an execution's log stream. The returned
    /// receiver sees every message published after this call; there is no
    /// replay of history. It is closed by `close_execution`.
    pub async fn subscribe(&self, execution_id: i64) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.entry(execution_id).or_default().push(tx);
        rx
    }

    /// Fan a message out to every current subscriber of the execution.
    /// No-op when the id has no registration.
    pub async fn publish(&self, execution_id: i64, message: &str) {
        let subscribers = self.subscribers.lock().await;
        if let Some(channels) = subscribers.get(&execution_id) {
            for tx in channels {
                // Drop on full or disconnected; the executor must never stall
                // behind a slow log consumer.
                let _ = tx.try_send(message.to_string());
            }
        }
    }

    /// Signal end-of-stream: close every subscriber channel for the execution
    /// and forget the registration. Safe to call with zero subscribers; a
    /// later subscribe for the same id starts from scratch.
    pub async fn close_execution(&self, execution_id: i64) {
        let mut subscribers = self.subscribers.lock().await;
        // Dropping the senders closes each receiver.
        subscribers.remove(&execution_id);
    }
}
