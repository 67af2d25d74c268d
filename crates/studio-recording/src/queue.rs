//! Thread-safe FIFO of segment files.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{RecordingError, RecordingResult};

#[derive(Default)]
struct Inner {
    segments: VecDeque<PathBuf>,
    closed: bool,
}

/// Hands segment files from a producer to a consumer in arrival order.
///
/// Share it behind an `Arc`. Closing wakes every blocked consumer; segments
/// pushed before the close can still be popped.
#[derive(Default)]
pub struct SegmentQueue {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment and wake one waiting consumer.
    pub fn push(&self, segment: PathBuf) -> RecordingResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(RecordingError::QueueClosed);
        }
        trace!(segment = %segment.display(), "Segment queued");
        inner.segments.push_back(segment);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<PathBuf> {
        self.inner.lock().segments.pop_front()
    }

    /// Block until a segment is available. `None` once closed and drained.
    pub fn pop(&self) -> Option<PathBuf> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(segment) = inner.segments.pop_front() {
                return Some(segment);
            }
            if inner.closed {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Like [`pop`](Self::pop), giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<PathBuf> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(segment) = inner.segments.pop_front() {
                return Some(segment);
            }
            if inner.closed {
                return None;
            }
            if self.available.wait_until(&mut inner, deadline).timed_out() {
                return inner.segments.pop_front();
            }
        }
    }

    /// Refuse further pushes and release every waiter.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Drop all pending segments.
    pub fn clear(&self) {
        self.inner.lock().segments.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().segments.is_empty()
    }
}
