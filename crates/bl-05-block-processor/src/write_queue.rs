//! Process-wide single-writer gate.
//!
//! The backing store supports many readers but one writer. Every subsystem
//! that opens a write transaction first queues here under its writer
//! identity. Admission is FIFO, which gives cementing a bounded wait: the
//! block processor additionally polls [`WriteQueue::contains`] for a
//! waiting cementer and yields between batches via `wait_write`.
//!
//! The guard releases the gate on drop on every exit path.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Writer identities, used for fairness decisions and diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Writer {
    ProcessBatch,
    ConfirmationHeight,
    Testing,
}

pub struct WriteQueue {
    queue: Mutex<VecDeque<Writer>>,
    condvar: Condvar,
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `writer` reaches the front of the queue, then returns
    /// the guard holding the gate.
    pub fn wait(&self, writer: Writer) -> WriteGuard<'_> {
        let mut queue = self.queue.lock();
        debug_assert!(
            !queue.contains(&writer),
            "a writer identity may only queue once"
        );
        queue.push_back(writer);
        while queue.front() != Some(&writer) {
            self.condvar.wait(&mut queue);
        }
        WriteGuard {
            queue: self,
            writer,
        }
    }

    /// Whether `writer` is currently queued or holding the gate.
    pub fn contains(&self, writer: Writer) -> bool {
        self.queue.lock().contains(&writer)
    }

    /// Non-blocking acquire: succeeds only when the queue is empty.
    pub fn try_acquire(&self, writer: Writer) -> Option<WriteGuard<'_>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            queue.push_back(writer);
            Some(WriteGuard {
                queue: self,
                writer,
            })
        } else {
            None
        }
    }
}

/// Holds the write gate for one writer; releases and wakes the next
/// waiter when dropped.
pub struct WriteGuard<'a> {
    queue: &'a WriteQueue,
    writer: Writer,
}

impl WriteGuard<'_> {
    pub fn writer(&self) -> Writer {
        self.writer
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.queue.queue.lock();
        debug_assert_eq!(queue.front(), Some(&self.writer));
        queue.pop_front();
        drop(queue);
        self.queue.condvar.notify_all();
    }
}
