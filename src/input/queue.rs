//! FIFO serialization of input operations.
//!
//! At most one queued operation runs at a time. Waiters are served in
//! arrival order (tokio's mutex is fair), and a failing operation releases
//! the queue like any other.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::trace;

// ============================================================================
// ActionQueue
// ============================================================================

/// Serializes input operations for one session.
#[derive(Debug, Default)]
pub struct ActionQueue {
    gate: Mutex<()>,
    in_flight: AtomicBool,
    queued: AtomicUsize,
}

impl ActionQueue {
    /// Creates an idle queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` once every earlier operation has settled.
    ///
    /// Returns whatever the operation returns; errors are passed through
    /// and do not affect later operations.
    pub async fn enqueue<F, T>(&self, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let position = self.queued.fetch_add(1, Ordering::SeqCst);
        trace!(position, "Operation queued");
        let _queued = Dequeue(&self.queued);

        let _guard = self.gate.lock().await;
        self.in_flight.store(true, Ordering::SeqCst);
        let _running = Settle(&self.in_flight);

        operation.await
    }

    /// Returns `true` while an operation is running.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of operations running or waiting.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Returns `true` if nothing is running or waiting.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the in-flight flag when an operation settles or is dropped.
struct Settle<'a>(&'a AtomicBool);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Leaves the queue, including when dropped while still waiting.
struct Dequeue<'a>(&'a AtomicUsize);

impl Drop for Dequeue<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Tests
// ============================================================================
