//! Helper-thread hand-off.
//!
//! Timer and signal helpers run on their own threads and never touch the
//! registry. They push plain-data events here; the interpreter thread
//! drains them when it gets around to it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::status::{CoreError, CoreResult};

/// Event posted by a helper thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A timer fired `expirations` times since the last drain
    Timer { id: u64, expirations: u64 },
    /// A signal was delivered
    Signal { signo: i32 },
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    closed: AtomicBool,
}

/// Bounded FIFO shared between helpers and the interpreter thread
///
/// Clones share one queue.
pub struct Handoff<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Handoff<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Handoff<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                capacity,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue an event; `Busy` when full, `InvalidArgument` once closed
    pub fn push(&self, event: T) -> CoreResult<()> {
        let mut queue = self.shared.queue.lock();
        if self.is_closed() {
            return Err(CoreError::invalid("hand-off is closed"));
        }
        if queue.len() >= self.shared.capacity {
            tracing::debug!(capacity = self.shared.capacity, "hand-off full");
            return Err(CoreError::busy("hand-off queue is full"));
        }
        queue.push_back(event);
        Ok(())
    }

    /// Take every pending event, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.shared.queue.lock().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Refuse further pushes and discard what is queued
    pub fn close(&self) {
        let mut queue = self.shared.queue.lock();
        self.shared.closed.store(true, Ordering::Release);
        let dropped = queue.drain(..).count();
        drop(queue);
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending events on close");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T> std::fmt::Debug for Handoff<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("pending", &self.pending())
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
