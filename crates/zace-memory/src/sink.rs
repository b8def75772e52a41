//! Single-writer async sink delivering messages to an external consumer
//! (typically the session journal), per §9's "async sink for memory →
//! journal" design note.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedSender};
use zace_core::types::Message;

/// A handle to a background writer task draining a bounded queue of
/// messages. The first write error is captured and held until
/// [`MessageSink::flush`] is called.
#[derive(Clone)]
pub struct MessageSink {
    tx: UnboundedSender<Message>,
    first_error: Arc<Mutex<Option<String>>>,
}

impl MessageSink {
    /// Spawn the writer task. `write` is called once per message, on a
    /// dedicated task, so the loop never blocks on sink I/O.
    pub fn spawn<F>(mut write: F) -> Self
    where
        F: FnMut(&Message) -> Result<(), String> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let first_error = Arc::new(Mutex::new(None));
        let first_error_task = Arc::clone(&first_error);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write(&message) {
                    let mut slot = first_error_task.lock().expect("sink error mutex poisoned");
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    tracing::warn!("memory sink write failed: {}", message.content.len());
                }
            }
        });

        Self { tx, first_error }
    }

    /// Enqueue a message for the writer task. Never blocks; a full queue
    /// is impossible since the channel is unbounded by design — this is a
    /// single-writer serialized queue, not a backpressure contract.
    pub fn send(&self, message: Message) {
        // Closed receiver means the writer task has already exited; the
        // sink then behaves as a no-op rather than panicking the loop.
        let _ = self.tx.send(message);
    }

    /// Return and clear the first error recorded since the last flush.
    pub async fn flush(&self) -> Option<String> {
        let mut slot = self.first_error.lock().expect("sink error mutex poisoned");
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zace_core::types::Role;

    #[tokio::test]
    async fn sink_delivers_messages_in_order() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sink = MessageSink::spawn(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        sink.send(Message::new(Role::User, "one"));
        sink.send(Message::new(Role::User, "two"));

        for _ in 0..50 {
            if count.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sink_captures_first_error_only() {
        let sink = MessageSink::spawn(|_msg| Err("disk full".to_string()));
        sink.send(Message::new(Role::User, "one"));
        sink.send(Message::new(Role::User, "two"));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let err = sink.flush().await;
        assert_eq!(err.as_deref(), Some("disk full"));
        // Second flush after the slot was drained returns None.
        assert_eq!(sink.flush().await, None);
    }
}
