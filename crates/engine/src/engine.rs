// SPDX-License-Identifier: MIT

//! The top-level facade (§4.8): loads state, owns the worker pool and
//! registries, and exposes the scheduling methods drivers call.

use std::sync::Arc;
use stevedore_codec::{read as codec_read, write_canonical_with};
use stevedore_core::provider::TaskContext;
use stevedore_core::resource::OpenMode;
use stevedore_core::{EngineError, Resource, TaskId, Value};
use std::io::Read as _;
use std::io::Write as _;

use crate::event_queue::EventQueue;
use crate::layout::{LayoutRegistry, LayoutStub};
use crate::pool::{WorkerPool, DEFAULT_POOL_SIZE};
use crate::registry::PlatformRegistry;
use crate::task_handle::EngineTaskHandle;
use crate::worker::{CancelFlag, NullSink, OutputSink, Worker};
use stevedore_core::event::PlatformEntry;

/// Optional collaborators an `Engine` can be built with; everything
/// defaults to a harmless no-op (§4.8 "substitutes ignoring sinks for
/// missing out/err/event-queue").
#[derive(Default)]
pub struct EngineOptions {
    pub events: Option<EventQueue>,
    pub out: Option<Arc<dyn OutputSink>>,
    pub err: Option<Arc<dyn OutputSink>>,
    pub pool_size: Option<usize>,
}

pub struct Engine {
    state_resource: Arc<dyn Resource>,
    platforms: Arc<PlatformRegistry>,
    layouts: Arc<LayoutRegistry>,
    pool: Arc<WorkerPool>,
    events: EventQueue,
    out: Arc<dyn OutputSink>,
    err: Arc<dyn OutputSink>,
}

impl Engine {
    /// Opens `state_resource`, loading any existing `platforms`/`layouts`
    /// entries. A missing resource is not an error (§4.8); any other
    /// structural defect in the document is a read error.
    pub fn open(state_resource: Box<dyn Resource>, options: EngineOptions) -> Result<Self, EngineError> {
        let state_resource: Arc<dyn Resource> = Arc::from(state_resource);
        let platforms = Arc::new(PlatformRegistry::new());
        let layouts = Arc::new(LayoutRegistry::new());

        match read_document(state_resource.as_ref()) {
            Ok(Some(document)) => {
                load_platforms(&document, &platforms, state_resource.as_ref())?;
                load_layouts(&document, &layouts)?;
                tracing::info!(
                    platforms = platforms.items().len(),
                    layouts = layouts.items().len(),
                    "loaded engine state"
                );
            }
            Ok(None) => tracing::info!("no existing engine state, starting empty"),
            Err(e) => {
                tracing::error!(error = %e, "failed to read engine state");
                return Err(e);
            }
        }

        Ok(Self {
            state_resource,
            platforms,
            layouts,
            pool: Arc::new(WorkerPool::new(options.pool_size.unwrap_or(DEFAULT_POOL_SIZE))),
            events: options.events.unwrap_or_default(),
            out: options.out.unwrap_or_else(|| Arc::new(NullSink)),
            err: options.err.unwrap_or_else(|| Arc::new(NullSink)),
        })
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn layouts(&self) -> &LayoutRegistry {
        &self.layouts
    }

    /// Synchronous snapshot of `(name, available)` pairs in registration
    /// order, for callers that want the registry's ordering without
    /// scheduling and draining a `platforms()` task.
    pub fn platforms_snapshot(&self) -> Vec<(String, bool)> {
        self.platforms
            .items()
            .into_iter()
            .map(|(name, stub)| (name, stub.available()))
            .collect()
    }

    fn schedule<T, F, Fut>(&self, op: F) -> EngineTaskHandle<T>
    where
        F: FnOnce(Arc<Worker>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = Arc::new(CancelFlag::default());
        let worker = Arc::new(Worker::new(
            TaskId::new(),
            self.events.clone(),
            cancel.clone(),
            self.out.clone(),
            self.err.clone(),
        ));
        self.pool.submit(worker, cancel, op)
    }

    /// Lists every registered platform as one `platform-entry` event per
    /// entry, progress split evenly across them; the result is the count.
    pub fn platforms(&self) -> EngineTaskHandle<usize> {
        let platforms = self.platforms.clone();
        self.schedule(move |worker| async move {
            let items = platforms.items();
            let total = items.len();
            for (i, (name, stub)) in items.into_iter().enumerate() {
                worker.dispatch_custom(stevedore_core::EventKind::PlatformEntry(PlatformEntry {
                    name,
                    available: stub.available(),
                    provider: stub.provider_name().to_string(),
                }));
                if total > 0 {
                    worker.progress(Some((i + 1) as f64 / total as f64));
                }
            }
            Ok(total)
        })
    }

    /// Creates a stub, configures it, and only then publishes it (§4.8
    /// rationale: a failed configure must not leave a partial platform).
    pub fn register(&self, name: String, provider: String, properties: Value) -> EngineTaskHandle<()> {
        let platforms = self.platforms.clone();
        let state_resource = self.state_resource.clone();
        self.schedule(move |worker| async move {
            tracing::info!(platform = %name, provider = %provider, "registering platform");
            let stub = platforms.create(&name, &provider, properties, state_resource.as_ref())?;
            if let Err(e) = stub.configure(worker.as_ref()).await {
                tracing::warn!(platform = %name, error = %e, "platform configure failed");
                return Err(e);
            }
            platforms.put(name, stub)
        })
    }

    /// Optionally destroys, then always removes. If `destroy` fails the
    /// platform remains registered.
    pub fn dismiss(&self, name: String, destroy: bool) -> EngineTaskHandle<()> {
        let platforms = self.platforms.clone();
        self.schedule(move |worker| async move {
            tracing::info!(platform = %name, destroy, "dismissing platform");
            if destroy {
                let stub = platforms.get(&name)?;
                if let Err(e) = stub.destroy(worker.as_ref()).await {
                    tracing::error!(platform = %name, error = %e, "platform destroy failed");
                    return Err(e);
                }
            }
            platforms.remove(&name).map(|_| ())
        })
    }

    /// Reserved for future state reporting; currently a no-op.
    pub fn watch(&self, _name: String) -> EngineTaskHandle<()> {
        self.schedule(|_worker| async move { Ok(()) })
    }

    /// Builds then publishes an image. No rollback of build on publish
    /// failure.
    pub fn offer(&self, name: String, image: Value) -> EngineTaskHandle<()> {
        let platforms = self.platforms.clone();
        self.schedule(move |worker| async move {
            tracing::info!(platform = %name, "offering image");
            let stub = platforms.get(&name)?;
            stub.image_build(worker.as_ref(), &image).await?;
            stub.image_publish(worker.as_ref(), &image).await
        })
    }

    /// Removes then unpublishes an image.
    pub fn retire(&self, name: String, image: Value) -> EngineTaskHandle<()> {
        let platforms = self.platforms.clone();
        self.schedule(move |worker| async move {
            tracing::info!(platform = %name, "retiring image");
            let stub = platforms.get(&name)?;
            stub.image_remove(worker.as_ref(), &image).await?;
            stub.image_unpublish(worker.as_ref(), &image).await
        })
    }

    /// Reserved for future layout realization; currently a no-op.
    pub fn emerge(&self, _layout: Value) -> EngineTaskHandle<()> {
        self.schedule(|_worker| async move { Ok(()) })
    }

    /// Serializes `platforms` (and any registered layouts) to the state
    /// resource in canonical form. Synchronous; not itself a task.
    pub fn store(&self) -> Result<(), EngineError> {
        let mut platforms_doc = indexmap::IndexMap::new();
        for (name, stub) in self.platforms.items() {
            let mut entry = indexmap::IndexMap::new();
            entry.insert("provider".to_string(), Value::from(stub.provider_name()));
            entry.insert("properties".to_string(), stub.properties().clone());
            platforms_doc.insert(name, Value::Map(entry));
        }

        let mut layouts_doc = indexmap::IndexMap::new();
        for (name, stub) in self.layouts.items() {
            let mut entry = indexmap::IndexMap::new();
            entry.insert("resource".to_string(), Value::from(stub.resource().unref()));
            entry.insert("properties".to_string(), stub.properties().clone());
            layouts_doc.insert(name, Value::Map(entry));
        }

        let mut document = indexmap::IndexMap::new();
        document.insert("platforms".to_string(), Value::Map(platforms_doc));
        document.insert("layouts".to_string(), Value::Map(layouts_doc));

        let text = write_canonical_with(&Value::Map(document), &should_sort_state_map);
        let mut stream = self.state_resource.open(OpenMode::Write)?;
        stream.write_all(text.as_bytes())?;
        tracing::info!(
            platforms = self.platforms.items().len(),
            layouts = self.layouts.items().len(),
            "stored engine state"
        );
        Ok(())
    }
}

/// `platforms`/`layouts` are name-keyed registries whose entry order is
/// registration order (§8 "re-open: platforms() emits entries in the
/// same order"), so that one level is left unsorted; everything else
/// (the document root, and each entry's own `provider`/`properties` or
/// `resource`/`properties` keys) sorts for a deterministic byte form.
fn should_sort_state_map(path: &[String]) -> bool {
    !matches!(path, [p] if p == "platforms" || p == "layouts")
}

fn read_document(resource: &dyn Resource) -> Result<Option<Value>, EngineError> {
    if !resource.exists()? {
        return Ok(None);
    }
    let mut stream = resource.open(OpenMode::Read)?;
    let mut text = String::new();
    stream.read_to_string(&mut text)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value = codec_read(&text).map_err(|e| EngineError::ReadError(e.to_string()))?;
    Ok(Some(value))
}

fn load_platforms(
    document: &Value,
    platforms: &PlatformRegistry,
    state_resource: &dyn Resource,
) -> Result<(), EngineError> {
    let Some(entries) = document.get("platforms").and_then(Value::as_map) else {
        return Ok(());
    };
    for (name, data) in entries {
        let provider = data
            .get("provider")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::ReadError(format!("platform '{name}' missing provider")))?;
        let properties = data.get("properties").cloned().unwrap_or_else(Value::empty_map);
        let stub = platforms.create(name, provider, properties, state_resource)?;
        platforms.put(name.clone(), stub)?;
    }
    Ok(())
}

fn load_layouts(document: &Value, layouts: &LayoutRegistry) -> Result<(), EngineError> {
    let Some(entries) = document.get("layouts").and_then(Value::as_map) else {
        return Ok(());
    };
    for (name, data) in entries {
        let uri = data
            .get("resource")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::ReadError(format!("layout '{name}' missing resource")))?;
        let properties = data.get("properties").cloned().unwrap_or_else(Value::empty_map);
        let resource = stevedore_core::resource::from_uri(uri)?;
        layouts.put(name.clone(), LayoutStub::new(resource, properties))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
