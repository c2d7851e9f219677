//! Unbounded recording queue with a drain barrier.
//!
//! The queue decouples the sensor cadence from disk and encode latency:
//! `push` never blocks, the writer parks in `pop_blocking`, and `drain_wait`
//! gives stop-recording its determinism — it returns only once every pushed
//! frame has been popped *and* marked processed via `task_done`, so sinks can
//! be closed knowing nothing is still in flight. This is a joinable task
//! queue built from a `Mutex<VecDeque>` and two condvars.

use crate::frame::ThermalFrame;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<ThermalFrame>,
    /// Pushed but not yet `task_done`-marked. Counts popped-but-unprocessed
    /// items too, which is what makes the drain barrier cover in-flight work.
    unfinished: usize,
    closed: bool,
}

/// FIFO frame queue between the reader and writer threads.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    inner: Mutex<Inner>,
    /// Signaled on push and on close.
    available: Condvar,
    /// Signaled when `unfinished` drops to zero.
    drained: Condvar,
}

impl RecordingQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a frame. Never blocks; the queue is unbounded so acquisition
    /// is never back-pressured by the writer.
    pub fn push(&self, frame: ThermalFrame) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.push_back(frame);
        inner.unfinished += 1;
        self.available.notify_one();
    }

    /// Dequeue the oldest frame, blocking until one is available. Returns
    /// `None` once the queue has been closed and emptied — the writer's
    /// clean-exit signal.
    pub fn pop_blocking(&self) -> Option<ThermalFrame> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(frame) = inner.items.pop_front() {
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            inner = self.available.wait(inner).unwrap();
        }
    }

    /// Mark the most recently popped frame as fully processed. Must be
    /// called exactly once per successful `pop_blocking`, regardless of
    /// whether processing succeeded.
    pub fn task_done(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert!(inner.unfinished > 0, "task_done without matching pop");
        inner.unfinished -= 1;
        if inner.unfinished == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every pushed frame has been popped and `task_done`-marked.
    pub fn drain_wait(&self) {
        let mut inner = self.inner.lock().unwrap();
        while inner.unfinished > 0 {
            inner = self.drained.wait(inner).unwrap();
        }
    }

    /// Close the queue: pending frames still drain, after which
    /// `pop_blocking` returns `None`. Used at pipeline teardown.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.available.notify_all();
    }

    /// Number of frames currently waiting to be popped.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    /// True when no frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
