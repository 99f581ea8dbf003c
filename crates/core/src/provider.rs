// SPDX-License-Identifier: MIT

//! The provider contract (§4.7, §6) and the process-wide builder table that
//! replaces the reference implementation's runtime module import (§9
//! "Dynamic provider dispatch"):
//!
//! > In a systems language, model providers as implementations of a single
//! > interface registered at program start (builder table: provider-name →
//! > constructor). The *not-available* state becomes a null lookup in that
//! > table.

use crate::error::EngineError;
use crate::resource::Resource;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A read-only, lazily-resolving view over a property bag (§4.2 "lazy
/// view"). Implemented by `stevedore-template::LazyView`; kept as a trait
/// here so `stevedore-core` need not depend on the template crate.
pub trait ResolvableProperties: Send + Sync {
    /// Resolve `key` against the bag, substituting `#{expr}` placeholders
    /// in any string leaf on the fly.
    fn resolve(&self, key: &str) -> Option<Value>;

    /// The raw, unresolved value backing this view.
    fn raw(&self) -> &Value;
}

/// The engine-owned object passed into provider methods for
/// message/progress/cancellation plumbing (§4.5 "Task context").
///
/// `out`/`err` are modeled as byte-sink write calls rather than raw
/// stream handles so the trait stays object-safe and thread-safe across
/// worker threads.
pub trait TaskContext: Send + Sync {
    fn message(&self, text: &str);

    /// `None` emits indeterminate progress.
    fn progress(&self, x: Option<f64>);

    /// Opens a new progress segment of relative size `t` in `[0, 1]`.
    fn progress_track(&self, t: f64);

    /// Fails with `EngineError::TaskCancelled` if cancellation has been
    /// requested; otherwise returns normally and disarms the flag.
    fn cancel_check(&self) -> Result<(), EngineError>;

    fn write_out(&self, bytes: &[u8]);

    fn write_err(&self, bytes: &[u8]);

    /// Dispatches a domain-specific event (§3 "a provider chooses to
    /// dispatch [additional kinds] through its task context") — anything
    /// beyond message/progress that doesn't fit the fixed event kinds.
    fn emit(&self, name: &str, payload: Value);
}

/// Provider-facing operations (§4.7, §6). Each may suspend arbitrarily
/// long; none returns a meaningful value.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn configure(&self, ctx: &dyn TaskContext) -> Result<(), EngineError>;
    async fn destroy(&self, ctx: &dyn TaskContext) -> Result<(), EngineError>;
    async fn image_build(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError>;
    async fn image_publish(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError>;
    async fn image_remove(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError>;
    async fn image_unpublish(&self, ctx: &dyn TaskContext, image: &Value)
        -> Result<(), EngineError>;
}

/// Constructs a provider instance from its per-platform data resource and
/// its resolvable properties (§6 "Provider contract").
pub type ProviderCtor =
    fn(Box<dyn Resource>, Arc<dyn ResolvableProperties>) -> Arc<dyn Provider>;

/// The builder table providers register themselves into at program start,
/// keyed by provider name.
#[derive(Default)]
pub struct ProviderRegistry {
    table: RwLock<HashMap<String, ProviderCtor>>,
}

impl ProviderRegistry {
    pub fn register(&self, name: impl Into<String>, ctor: ProviderCtor) {
        self.table.write().insert(name.into(), ctor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().contains_key(name)
    }

    /// Looks up `name` and constructs a provider instance. Returns `None`
    /// when the name is not registered — the "null lookup" that models the
    /// reference implementation's failed module import.
    pub fn construct(
        &self,
        name: &str,
        data_resource: Box<dyn Resource>,
        props: Arc<dyn ResolvableProperties>,
    ) -> Option<Arc<dyn Provider>> {
        let ctor = *self.table.read().get(name)?;
        Some(ctor(data_resource, props))
    }
}

/// Process-wide provider builder table.
pub static PROVIDERS: OnceLock<ProviderRegistry> = OnceLock::new();

/// Accessor that lazily initializes the global table on first use.
pub fn providers() -> &'static ProviderRegistry {
    PROVIDERS.get_or_init(ProviderRegistry::default)
}
