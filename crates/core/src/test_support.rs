// SPDX-License-Identifier: MIT

//! Test doubles shared across crates, gated behind the `test-support`
//! feature so `stevedore-engine`'s and the workspace's integration tests
//! can depend on them without duplicating fakes.

use crate::error::EngineError;
use crate::provider::{Provider, ResolvableProperties, TaskContext};
use crate::value::Value;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A `ResolvableProperties` that resolves nothing beyond the raw map
/// lookup; good enough for providers that don't exercise templating.
pub struct FakeProperties(Value);

impl FakeProperties {
    pub fn new(value: Value) -> Arc<dyn ResolvableProperties> {
        Arc::new(Self(value))
    }
}

impl ResolvableProperties for FakeProperties {
    fn resolve(&self, key: &str) -> Option<Value> {
        self.0.get(key).cloned()
    }

    fn raw(&self) -> &Value {
        &self.0
    }
}

/// What a `FakeProvider` method call should do.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Return `Ok(())` right away.
    Succeed,
    /// Return `Err(EngineError::Provider(_))` right away.
    Fail(String),
    /// Poll `cancel_check` every millisecond, up to `checks` times, sleeping
    /// between polls so the task can be cancelled out from under it. Used
    /// by the cancellation-latency scenario.
    RunUntilCancelled { checks: u32 },
}

impl Default for FakeBehavior {
    fn default() -> Self {
        FakeBehavior::Succeed
    }
}

/// A call log entry: which method, in invocation order.
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// A provider double whose behavior per method is configured up front and
/// whose calls are recorded for assertions.
pub struct FakeProvider {
    pub behavior: FakeBehavior,
    pub calls: CallLog,
}

impl FakeProvider {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    async fn run(&self, which: &'static str, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        self.calls.lock().push(which);
        match &self.behavior {
            FakeBehavior::Succeed => Ok(()),
            FakeBehavior::Fail(msg) => Err(EngineError::Provider(msg.clone())),
            FakeBehavior::RunUntilCancelled { checks } => {
                for _ in 0..*checks {
                    ctx.cancel_check()?;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                ctx.cancel_check()
            }
        }
    }
}

#[async_trait::async_trait]
impl Provider for FakeProvider {
    async fn configure(&self, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        self.run("configure", ctx).await
    }

    async fn destroy(&self, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        self.run("destroy", ctx).await
    }

    async fn image_build(&self, ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        self.run("image_build", ctx).await
    }

    async fn image_publish(
        &self,
        ctx: &dyn TaskContext,
        _image: &Value,
    ) -> Result<(), EngineError> {
        self.run("image_publish", ctx).await
    }

    async fn image_remove(
        &self,
        ctx: &dyn TaskContext,
        _image: &Value,
    ) -> Result<(), EngineError> {
        self.run("image_remove", ctx).await
    }

    async fn image_unpublish(
        &self,
        ctx: &dyn TaskContext,
        _image: &Value,
    ) -> Result<(), EngineError> {
        self.run("image_unpublish", ctx).await
    }
}

/// Registers `"fake"` in the given registry, constructing `FakeProvider`s
/// with `FakeBehavior::Succeed`. Tests that need a different behavior
/// should construct `FakeProvider` directly and wrap it with their own
/// `Arc<dyn Provider>` rather than going through the registry.
pub fn register_fake(registry: &crate::provider::ProviderRegistry) {
    fn ctor(
        _data: Box<dyn crate::resource::Resource>,
        _props: Arc<dyn ResolvableProperties>,
    ) -> Arc<dyn Provider> {
        Arc::new(FakeProvider::new(FakeBehavior::Succeed))
    }
    registry.register("fake", ctor);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCtx;

    impl TaskContext for NullCtx {
        fn message(&self, _text: &str) {}
        fn progress(&self, _x: Option<f64>) {}
        fn progress_track(&self, _t: f64) {}
        fn cancel_check(&self) -> Result<(), EngineError> {
            Ok(())
        }
        fn write_out(&self, _bytes: &[u8]) {}
        fn write_err(&self, _bytes: &[u8]) {}
        fn emit(&self, _name: &str, _payload: Value) {}
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let provider = FakeProvider::new(FakeBehavior::Succeed);
        let ctx = NullCtx;
        provider.configure(&ctx).await.unwrap();
        provider.image_build(&ctx, &Value::empty_map()).await.unwrap();
        assert_eq!(*provider.calls().lock(), vec!["configure", "image_build"]);
    }

    #[tokio::test]
    async fn fail_behavior_surfaces_message() {
        let provider = FakeProvider::new(FakeBehavior::Fail("boom".into()));
        let ctx = NullCtx;
        let err = provider.destroy(&ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(m) if m == "boom"));
    }
}
