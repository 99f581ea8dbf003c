// SPDX-License-Identifier: MIT

//! The per-task object owning cancellation state, progress accounting,
//! and event dispatch (§4.5, §3 "Progress accounting").
//!
//! Cyclic ownership note (§9): the worker is the stable object; the task
//! context below only borrows it for the lifetime of one operation call,
//! and the engine task handle holds its own, independent `Arc` to the
//! shared cancellation flag rather than a back-reference to the worker
//! itself — the pool is what keeps the worker alive until `finished` is
//! dispatched.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stevedore_core::provider::TaskContext;
use stevedore_core::{Event, EventKind, TaskId};

use crate::event_queue::EventQueue;

/// Where a worker's stdout/stderr bytes go. Output sinks are not guarded
/// (§5): callers sharing one sink across tasks are responsible for its
/// thread safety.
pub trait OutputSink: Send + Sync {
    fn write(&self, bytes: &[u8]);
}

/// Discards everything written to it; the default when a caller doesn't
/// care about a task's raw output.
#[derive(Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&self, _bytes: &[u8]) {}
}

#[derive(Default)]
struct ProgressState {
    value: f64,
    track: f64,
}

/// Shared, `Clone`-free cancellation flag: the handle arms it, the worker
/// polls and disarms it on the first raise.
#[derive(Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn check_and_disarm(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns one task's cancellation flag, progress accumulators, event
/// dispatch, and output sinks; implements the provider-facing
/// `TaskContext`.
pub struct Worker {
    task: TaskId,
    queue: EventQueue,
    progress: Mutex<ProgressState>,
    cancel: Arc<CancelFlag>,
    out: Arc<dyn OutputSink>,
    err: Arc<dyn OutputSink>,
}

impl Worker {
    pub fn new(
        task: TaskId,
        queue: EventQueue,
        cancel: Arc<CancelFlag>,
        out: Arc<dyn OutputSink>,
        err: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            task,
            queue,
            progress: Mutex::new(ProgressState::default()),
            cancel,
            out,
            err,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task
    }

    fn dispatch(&self, kind: EventKind) {
        self.queue.dispatch(Event::new(self.task.clone(), kind));
    }

    pub fn dispatch_started(&self) {
        self.dispatch(EventKind::Started);
    }

    pub fn dispatch_finished(&self) {
        self.dispatch(EventKind::Finished);
    }

    /// Engine-internal events (e.g. `platform-entry`) that aren't part of
    /// the provider-facing `TaskContext` surface, so operations dispatch
    /// them straight through the concrete `Worker` they're handed.
    pub fn dispatch_custom(&self, kind: EventKind) {
        self.dispatch(kind);
    }
}

impl TaskContext for Worker {
    fn message(&self, text: &str) {
        self.dispatch(EventKind::Message(text.to_string()));
    }

    fn progress(&self, x: Option<f64>) {
        let emitted = match x {
            None => None,
            Some(x) => {
                let state = self.progress.lock();
                Some(state.value + state.track * x)
            }
        };
        self.dispatch(EventKind::Progress(emitted));
    }

    fn progress_track(&self, t: f64) {
        let value = {
            let mut state = self.progress.lock();
            state.value += state.track;
            state.track = t;
            state.value
        };
        self.dispatch(EventKind::Progress(Some(value)));
    }

    fn cancel_check(&self) -> Result<(), stevedore_core::EngineError> {
        if self.cancel.check_and_disarm() {
            Err(stevedore_core::EngineError::TaskCancelled)
        } else {
            Ok(())
        }
    }

    fn write_out(&self, bytes: &[u8]) {
        self.out.write(bytes);
    }

    fn write_err(&self, bytes: &[u8]) {
        self.err.write(bytes);
    }

    fn emit(&self, name: &str, payload: stevedore_core::Value) {
        self.dispatch(EventKind::Custom {
            name: name.to_string(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> (Worker, EventQueue) {
        let queue = EventQueue::new();
        let cancel = Arc::new(CancelFlag::default());
        let worker = Worker::new(
            TaskId::new(),
            queue.clone(),
            cancel,
            Arc::new(NullSink),
            Arc::new(NullSink),
        );
        (worker, queue)
    }

    #[tokio::test]
    async fn progress_aggregation_matches_spec_example() {
        let (worker, queue) = worker();
        worker.progress_track(0.25);
        worker.progress(Some(1.0));
        worker.progress_track(0.75);
        worker.progress(Some(0.5));
        queue.close();

        let mut emitted = Vec::new();
        while let Some(event) = queue.recv().await {
            if let EventKind::Progress(Some(v)) = event.kind {
                emitted.push(v);
            }
        }
        assert_eq!(emitted, vec![0.0, 0.25, 0.25, 0.625]);
    }

    #[test]
    fn cancel_check_disarms_after_first_raise() {
        let (worker, _queue) = worker();
        worker.cancel.arm();
        assert!(worker.cancel_check().is_err());
        assert!(worker.cancel_check().is_ok());
    }

    #[test]
    fn cancel_check_is_ok_when_not_armed() {
        let (worker, _queue) = worker();
        assert!(worker.cancel_check().is_ok());
    }

    #[tokio::test]
    async fn emit_dispatches_a_custom_event_with_its_payload() {
        let (worker, queue) = worker();
        worker.emit("image-tagged", stevedore_core::Value::from("v1"));
        queue.close();

        let event = queue.recv().await.unwrap();
        match event.kind {
            EventKind::Custom { name, payload } => {
                assert_eq!(name, "image-tagged");
                assert_eq!(payload, stevedore_core::Value::from("v1"));
            }
            other => panic!("expected a custom event, got {other:?}"),
        }
    }
}
