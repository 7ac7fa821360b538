//! FIFO queue of L1-originated delayed messages awaiting sequencing.
//!
//! Unlike the transaction intake queue there is nobody to settle: delayed
//! messages have no waiting submitter, so `clear` simply discards. Ordering
//! correctness of the indices is the producer's responsibility; the queue
//! guarantees FIFO delivery of what it received.

use std::collections::VecDeque;

use orbit_primitives::{DelayedMessage, L1IncomingMessage};
use parking_lot::Mutex;

use crate::metrics::SEQUENCER_METRICS as SM;

#[derive(Default)]
struct Inner {
    queue: VecDeque<DelayedMessage>,
    /// Index of the last message ever enqueued; survives dequeues so that
    /// the inbox reader can ask for the next index to produce.
    tail: Option<u64>,
}

/// Multi-producer, single-consumer queue of delayed messages.
#[derive(Default)]
pub struct DelayedMessageQueue {
    inner: Mutex<Inner>,
}

impl DelayedMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends messages with indices `first_index, first_index + 1, ...` in
    /// order.
    pub fn enqueue(&self, messages: Vec<L1IncomingMessage>, first_index: u64) {
        let mut inner = self.inner.lock();
        for (i, message) in messages.into_iter().enumerate() {
            let index = first_index + i as u64;
            inner.queue.push_back(DelayedMessage { message, index });
            inner.tail = Some(index);
        }
        SM.delayed_queue_msgs.set(inner.queue.len() as f64);
    }

    /// Pops the next message in FIFO order.
    pub fn try_dequeue(&self) -> Option<DelayedMessage> {
        let mut inner = self.inner.lock();
        let message = inner.queue.pop_front();
        SM.delayed_queue_msgs.set(inner.queue.len() as f64);
        message
    }

    /// Puts a popped message back at the front, keeping index order intact.
    pub fn requeue_front(&self, message: DelayedMessage) {
        let mut inner = self.inner.lock();
        inner.queue.push_front(message);
        SM.delayed_queue_msgs.set(inner.queue.len() as f64);
    }

    /// Index of the last message ever enqueued.
    pub fn peek_tail_index(&self) -> Option<u64> {
        self.inner.lock().tail
    }

    /// Discards all pending messages.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.tail = None;
        SM.delayed_queue_msgs.set(0.0);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }
}
