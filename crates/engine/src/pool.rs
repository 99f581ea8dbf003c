// SPDX-License-Identifier: MIT

//! The fixed-size worker pool (§4.8 "recommended default: 10 parallel
//! workers"). A bounded `tokio::sync::Semaphore` is the async-idiomatic
//! analogue of a fixed thread pool: every submission spawns a task
//! immediately (so cancelling before a permit is acquired is cheap and
//! doesn't need a separate queue), but at most `size` of them hold a
//! permit and do real work concurrently.

use std::future::Future;
use std::sync::Arc;
use stevedore_core::provider::TaskContext;
use stevedore_core::EngineError;
use tokio::sync::Semaphore;

use crate::task_handle::{new_task, EngineTaskHandle};
use crate::worker::{CancelFlag, Worker};

pub const DEFAULT_POOL_SIZE: usize = 10;

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Submits `op` to run on the next free pool slot, wrapped so
    /// `started`/`finished` are dispatched around it unconditionally
    /// (§4.5 "the wrapped thunk captures exceptions so `finished` is
    /// always dispatched"). Returns immediately with the task's handle.
    pub fn submit<T, F, Fut>(&self, worker: Arc<Worker>, cancel: Arc<CancelFlag>, op: F) -> EngineTaskHandle<T>
    where
        F: FnOnce(Arc<Worker>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let (handle, completion) = new_task(cancel);
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let task = worker.task_id().to_string();
            tracing::debug!(task, "task started");
            worker.dispatch_started();
            let result = match worker.cancel_check() {
                Err(e) => Err(e),
                Ok(()) => op(worker.clone()).await,
            };
            match &result {
                Ok(_) => tracing::debug!(task, "task finished"),
                Err(e) => tracing::debug!(task, error = %e, "task finished with error"),
            }
            worker.dispatch_finished();
            completion.complete(result);
        });

        handle
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_queue::EventQueue;
    use crate::worker::NullSink;
    use stevedore_core::TaskId;

    fn worker(queue: EventQueue, cancel: Arc<CancelFlag>) -> Arc<Worker> {
        Arc::new(Worker::new(
            TaskId::new(),
            queue,
            cancel,
            Arc::new(NullSink),
            Arc::new(NullSink),
        ))
    }

    #[tokio::test]
    async fn submitted_task_runs_and_returns_value() {
        let pool = WorkerPool::new(2);
        let cancel = Arc::new(CancelFlag::default());
        let queue = EventQueue::new();
        let w = worker(queue, cancel.clone());

        let handle = pool.submit(w, cancel, |_worker| async move { Ok::<_, EngineError>(7) });
        assert_eq!(handle.result(None).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn pre_cancelled_task_never_runs_the_operation() {
        let pool = WorkerPool::new(2);
        let cancel = Arc::new(CancelFlag::default());
        cancel.arm();
        let queue = EventQueue::new();
        let w = worker(queue, cancel.clone());

        let handle: EngineTaskHandle<()> = pool.submit(w, cancel, |_worker| async move {
            panic!("operation must not run once pre-cancelled")
        });
        let err = handle.result(None).await.unwrap_err();
        assert!(matches!(err, EngineError::TaskCancelled));
    }

    #[tokio::test]
    async fn at_most_size_tasks_run_concurrently() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let pool = WorkerPool::new(1);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cancel = Arc::new(CancelFlag::default());
            let queue = EventQueue::new();
            let w = worker(queue, cancel.clone());
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(pool.submit(w, cancel, move |_worker| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, EngineError>(())
            }));
        }
        for handle in handles {
            handle.result(None).await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
