// SPDX-License-Identifier: MIT

//! Lazy binding of `(provider-name, properties)` to a provider instance
//! (§4.7). A stub's `provider` and `properties` never change after
//! construction (§3); only whether the provider resolved varies, and
//! that's a pure function of the builder table at construction time.

use stevedore_core::provider::{providers, TaskContext};
use stevedore_core::{EngineError, Provider, Resource, Value};
use stevedore_template::LazyView;
use std::sync::Arc;

struct StubInner {
    provider_name: String,
    properties: Value,
    data_resource: Arc<dyn Resource>,
    instance: Option<Arc<dyn Provider>>,
}

/// Cheaply `Clone`-able handle: the registry hands out clones of the same
/// underlying stub rather than references, so `items()` can return owned
/// values without holding its lock.
#[derive(Clone)]
pub struct PlatformStub {
    inner: Arc<StubInner>,
}

impl std::fmt::Debug for PlatformStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformStub")
            .field("provider_name", &self.inner.provider_name)
            .field("properties", &self.inner.properties)
            .finish_non_exhaustive()
    }
}

impl PlatformStub {
    pub fn new(provider_name: String, properties: Value, data_resource: Box<dyn Resource>) -> Self {
        let props_view: Arc<LazyView> = Arc::new(LazyView::new(properties.clone()));
        // The provider constructor takes the data resource by value; the
        // stub also wants to keep its own handle for `data_resource()`
        // accessors, so re-derive a second one from the same URI (a
        // resource handle is value-like and fully identified by its URI).
        let provider_resource = stevedore_core::resource::from_uri(&data_resource.unref());
        let data_resource: Arc<dyn Resource> = Arc::from(data_resource);
        let instance = match provider_resource {
            Ok(res) => providers().construct(&provider_name, res, props_view),
            Err(_) => None,
        };
        Self {
            inner: Arc::new(StubInner {
                provider_name,
                properties,
                data_resource,
                instance,
            }),
        }
    }

    pub fn data_resource(&self) -> &dyn Resource {
        self.inner.data_resource.as_ref()
    }

    pub fn provider_name(&self) -> &str {
        &self.inner.provider_name
    }

    pub fn properties(&self) -> &Value {
        &self.inner.properties
    }

    pub fn available(&self) -> bool {
        self.inner.instance.is_some()
    }

    fn instance(&self) -> Result<&Arc<dyn Provider>, EngineError> {
        self.inner
            .instance
            .as_ref()
            .ok_or_else(|| EngineError::NotAvailable(self.inner.provider_name.clone()))
    }

    pub async fn configure(&self, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        self.instance()?.configure(ctx).await
    }

    pub async fn destroy(&self, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        self.instance()?.destroy(ctx).await
    }

    pub async fn image_build(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError> {
        self.instance()?.image_build(ctx, image).await
    }

    pub async fn image_publish(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError> {
        self.instance()?.image_publish(ctx, image).await
    }

    pub async fn image_remove(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError> {
        self.instance()?.image_remove(ctx, image).await
    }

    pub async fn image_unpublish(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError> {
        self.instance()?.image_unpublish(ctx, image).await
    }
}
