// Queues connecting the stepping thread to a trainer
use std::fmt;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};

/// Returned by [`AgentManagerQueue::get_nowait`] when nothing is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the agent manager queue is empty")]
pub struct QueueEmpty;

/// FIFO queue tagged with the behavior it serves.
///
/// Clones share the same channel, so one clone can live on the producer thread
/// and another on the consumer thread. A `maxlen` of 0 means unbounded.
pub struct AgentManagerQueue<T> {
    behavior_id: String,
    maxlen: usize,
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> AgentManagerQueue<T> {
    pub fn new(behavior_id: impl Into<String>, maxlen: usize) -> Self {
        let (sender, receiver) = if maxlen == 0 {
            unbounded()
        } else {
            bounded(maxlen)
        };
        Self {
            behavior_id: behavior_id.into(),
            maxlen,
            sender,
            receiver,
        }
    }

    pub fn behavior_id(&self) -> &str {
        &self.behavior_id
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    /// Approximate number of queued items.
    pub fn qsize(&self) -> usize {
        self.receiver.len()
    }

    pub fn empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Takes the oldest item without blocking.
    pub fn get_nowait(&self) -> Result<T, QueueEmpty> {
        match self.receiver.try_recv() {
            Ok(item) => Ok(item),
            // The queue holds its own receiver, so it never disconnects.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Err(QueueEmpty),
        }
    }

    /// Enqueues an item, blocking while a bounded queue is full.
    pub fn put(&self, item: T) {
        // The queue holds its own receiver, so send cannot fail.
        let _ = self.sender.send(item);
    }
}

impl<T> Clone for AgentManagerQueue<T> {
    fn clone(&self) -> Self {
        Self {
            behavior_id: self.behavior_id.clone(),
            maxlen: self.maxlen,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> fmt::Debug for AgentManagerQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentManagerQueue")
            .field("behavior_id", &self.behavior_id)
            .field("maxlen", &self.maxlen)
            .field("qsize", &self.qsize())
            .finish()
    }
}
