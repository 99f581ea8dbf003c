// SPDX-License-Identifier: MIT

//! The consumer-facing handle returned by every scheduling call (§4.9).
//!
//! `result(timeout)` is async rather than literally blocking: every
//! suspension point downstream (provider calls, subprocess execution) is
//! already async in this codebase, and an async `result` is what lets a
//! single-threaded driver await several in-flight tasks without tying up
//! an OS thread per wait. `cancel()` stays synchronous — arming the
//! cooperative flag is a plain, non-suspending store.

use crate::worker::CancelFlag;
use std::sync::Arc;
use stevedore_core::EngineError;
use tokio::sync::oneshot;
use tokio::time::Duration;

struct Inner<T> {
    cancel: Arc<CancelFlag>,
    receiver: parking_lot::Mutex<Option<oneshot::Receiver<Result<T, EngineError>>>>,
}

/// Identity-only handle: equality is reference equality on the
/// underlying task, never on its eventual result.
pub struct EngineTaskHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EngineTaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for EngineTaskHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for EngineTaskHandle<T> {}

impl<T> std::fmt::Debug for EngineTaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineTaskHandle")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// Paired with the handle: the worker-side sender half and the shared
/// cancel flag that `Worker::cancel_check` polls.
pub struct TaskCompletion<T> {
    sender: oneshot::Sender<Result<T, EngineError>>,
}

impl<T> TaskCompletion<T> {
    pub fn complete(self, result: Result<T, EngineError>) {
        let _ = self.sender.send(result);
    }
}

pub fn new_task<T>(cancel: Arc<CancelFlag>) -> (EngineTaskHandle<T>, TaskCompletion<T>) {
    let (tx, rx) = oneshot::channel();
    let handle = EngineTaskHandle {
        inner: Arc::new(Inner {
            cancel,
            receiver: parking_lot::Mutex::new(Some(rx)),
        }),
    };
    (handle, TaskCompletion { sender: tx })
}

impl<T> EngineTaskHandle<T> {
    /// Arms cooperative cancellation for the underlying task. Idempotent:
    /// a second call only re-arms an already-disarmed flag.
    pub fn cancel(&self) {
        self.inner.cancel.arm();
    }

    /// Awaits the operation's outcome. `None` waits indefinitely; `Some`
    /// fails with `EngineError::Timeout` if the bound elapses first.
    ///
    /// May only be consumed once: a second call (the receiver already
    /// taken) fails with `EngineError::Timeout`, since there is no result
    /// left to wait for.
    pub async fn result(&self, timeout: Option<Duration>) -> Result<T, EngineError> {
        let receiver = self.inner.receiver.lock().take();
        let Some(receiver) = receiver else {
            return Err(EngineError::Timeout);
        };

        let outcome = match timeout {
            Some(d) => tokio::time::timeout(d, receiver)
                .await
                .map_err(|_| EngineError::Timeout)?,
            None => receiver.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(EngineError::TaskCancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn result_returns_the_completed_value() {
        let cancel = Arc::new(CancelFlag::default());
        let (handle, completion) = new_task::<u32>(cancel);
        completion.complete(Ok(42));
        assert_eq!(handle.result(None).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn result_times_out_when_nothing_completes() {
        let cancel = Arc::new(CancelFlag::default());
        let (handle, _completion) = new_task::<u32>(cancel);
        let err = handle
            .result(Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout));
    }

    #[test]
    fn equality_is_by_identity_not_value() {
        let cancel = Arc::new(CancelFlag::default());
        let (handle_a, _completion_a) = new_task::<u32>(cancel.clone());
        let (handle_b, _completion_b) = new_task::<u32>(cancel);
        let handle_a_clone = handle_a.clone();
        assert_eq!(handle_a, handle_a_clone);
        assert_ne!(handle_a, handle_b);
    }
}
