//! Typed messages exchanged between workers and the orchestrator.

use compact_str::CompactString;
use crossbeam_channel::{unbounded, Receiver, Sender};

use treesync_core::{Entry, ListError, ProbeError, TreeSide};

/// A unit of work or a result travelling over a queue.
///
/// Messages from one worker arrive in the order they were sent; nothing is
/// guaranteed across workers.
#[derive(Debug)]
pub enum Message {
    /// A lister found a path; any analyzer of that side may take it.
    PathDiscovered { side: TreeSide, path: CompactString },
    /// An analyzer finished probing a path.
    EntryResult { side: TreeSide, entry: Entry },
    /// An analyzer could not probe a path; the entry is skipped.
    ProbeFailed { side: TreeSide, error: ProbeError },
    /// A lister finished; exactly `discovered` paths were published.
    ListingComplete {
        side: TreeSide,
        discovered: usize,
        errors: Vec<ListError>,
    },
    /// A lister could not open its root.
    ListingFailed { side: TreeSide, error: ListError },
    /// A worker thread is unwinding from a panic.
    WorkerLost { worker: String },
    /// Stop the receiving analyzer.
    Terminate,
}

/// Unbounded multi-producer, multi-consumer queue of [`Message`]s.
///
/// Unbounded, so producers never block on a stalled consumer.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl MessageQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Get a sender (clone for each producer).
    pub fn sender(&self) -> Sender<Message> {
        self.sender.clone()
    }

    /// Get a receiver (clone for each consumer).
    pub fn receiver(&self) -> Receiver<Message> {
        self.receiver.clone()
    }

    /// Split into the underlying ends.
    pub fn into_parts(self) -> (Sender<Message>, Receiver<Message>) {
        (self.sender, self.receiver)
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_producer_order_is_preserved() {
        let queue = MessageQueue::new();
        let tx = queue.sender();
        for name in ["a", "b", "c"] {
            tx.send(Message::PathDiscovered {
                side: TreeSide::Source,
                path: name.into(),
            })
            .unwrap();
        }

        let rx = queue.receiver();
        let received: Vec<String> = (0..3)
            .map(|_| match rx.recv().unwrap() {
                Message::PathDiscovered { path, .. } => path.to_string(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(received, vec!["a", "b", "c"]);
    }
}
