// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stevedore-engine: the async, cancellable, event-emitting task-execution
//! engine (§3, §4) — workers, the event queue, the worker pool, the
//! platform/layout registries, and the `Engine` facade that ties them
//! together.

pub mod engine;
pub mod event_queue;
pub mod layout;
pub mod pool;
pub mod registry;
pub mod stub;
pub mod subprocess;
pub mod task_handle;
pub mod worker;

pub use engine::{Engine, EngineOptions};
pub use event_queue::EventQueue;
pub use layout::{LayoutRegistry, LayoutStub};
pub use pool::{WorkerPool, DEFAULT_POOL_SIZE};
pub use registry::PlatformRegistry;
pub use stub::PlatformStub;
pub use subprocess::execute as execute_subprocess;
pub use task_handle::EngineTaskHandle;
pub use worker::{CancelFlag, NullSink, OutputSink, Worker};
