// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stevedore-core: shared data model and error taxonomy for the Stevedore
//! container-platform management engine.

pub mod error;
pub mod event;
pub mod provider;
pub mod resource;
pub mod task_id;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::EngineError;
pub use event::{Event, EventKind};
pub use provider::{Provider, ProviderRegistry, PROVIDERS};
pub use resource::{Resource, Uri};
pub use task_id::TaskId;
pub use value::Value;
