// SPDX-License-Identifier: MIT

//! The ordered event stream a driver consumes (§4.4): many workers
//! dispatch, one driver iterates.
//!
//! Built on `tokio::mpsc`, whose underlying queue already gives FIFO
//! delivery and "all still-queued items are drained before the receiver
//! sees the end"; the piece it doesn't give us is an explicit `close()`
//! independent of every sender clone being dropped (workers hold their
//! own clone for the lifetime of their task), so the sender is kept
//! behind a lock that `close()` can clear out from under every clone at
//! once.

use parking_lot::Mutex as SyncMutex;
use stevedore_core::Event;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// FIFO stream of `Event`s. Cloning shares the same underlying channel:
/// every clone can dispatch, and any clone can close the queue for all of
/// them.
#[derive(Clone)]
pub struct EventQueue {
    tx: Arc<SyncMutex<Option<mpsc::UnboundedSender<Event>>>>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Event>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Arc::new(SyncMutex::new(Some(tx))),
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }

    /// Dispatches an event. Non-blocking; silently dropped once the queue
    /// has been closed (a worker racing a driver that stopped consuming).
    pub fn dispatch(&self, event: Event) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Awaits the next event, or `None` once the queue is closed and
    /// drained. Pre-close items already in the channel are still
    /// delivered before `None`.
    pub async fn recv(&self) -> Option<Event> {
        self.rx.lock().await.recv().await
    }

    /// Closes the queue. Already-dispatched events remain deliverable;
    /// `dispatch` after this point is a no-op. Idempotent.
    pub fn close(&self) {
        self.tx.lock().take();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
