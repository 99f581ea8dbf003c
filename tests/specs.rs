// SPDX-License-Identifier: MIT

//! End-to-end scenarios driving `stevedore-engine` through its public
//! facade only, covering the task-execution engine's testable properties.

use std::sync::Arc;
use std::time::Duration;
use stevedore_core::provider::{providers, TaskContext};
use stevedore_core::test_support::register_fake;
use stevedore_core::{EngineError, EventKind, Provider, Resource, Value};
use stevedore_engine::{Engine, EngineOptions, EventQueue};

fn state_resource(dir: &tempfile::TempDir) -> Box<dyn Resource> {
    stevedore_core::resource::from_uri(&format!("file://{}/state.json", dir.path().display())).unwrap()
}

/// Surfaces the engine's `tracing` output (state I/O, provider calls,
/// task lifecycle) under `cargo test -- --nocapture`.
fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").init();
    });
}

#[tokio::test]
async fn empty_engine_reports_zero_and_brackets_with_started_finished() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let events = EventQueue::new();
    let engine = Engine::open(
        state_resource(&dir),
        EngineOptions {
            events: Some(events.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    let handle = engine.platforms();
    assert_eq!(handle.result(None).await.unwrap(), 0);

    assert!(events.recv().await.unwrap().is_started());
    assert!(events.recv().await.unwrap().is_finished());
}

#[tokio::test]
async fn register_then_list_emits_one_platform_entry() {
    init_tracing();
    register_fake(providers());
    let dir = tempfile::tempdir().unwrap();
    let events = EventQueue::new();
    let engine = Engine::open(
        state_resource(&dir),
        EngineOptions {
            events: Some(events.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    engine
        .register("local".to_string(), "fake".to_string(), Value::empty_map())
        .result(None)
        .await
        .unwrap();
    while !events.recv().await.unwrap().is_finished() {}

    let handle = engine.platforms();
    let count = handle.result(None).await.unwrap();
    assert_eq!(count, 1);

    let mut saw_entry = false;
    loop {
        let ev = events.recv().await.unwrap();
        if let EventKind::PlatformEntry(entry) = &ev.kind {
            assert_eq!(entry.name, "local");
            assert_eq!(entry.provider, "fake");
            saw_entry = true;
        }
        if ev.is_finished() {
            break;
        }
    }
    assert!(saw_entry);
}

#[tokio::test]
async fn persist_round_trip_preserves_order() {
    init_tracing();
    register_fake(providers());
    let dir = tempfile::tempdir().unwrap();

    {
        let engine = Engine::open(state_resource(&dir), EngineOptions::default()).unwrap();
        for name in ["second", "first"] {
            engine
                .register(name.to_string(), "fake".to_string(), Value::empty_map())
                .result(None)
                .await
                .unwrap();
        }
        engine.store().unwrap();
    }

    let reopened = Engine::open(state_resource(&dir), EngineOptions::default()).unwrap();
    let names: Vec<_> = reopened
        .platforms_snapshot()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["second", "first"]);
}

struct SlowImageBuildProvider;

#[async_trait::async_trait]
impl Provider for SlowImageBuildProvider {
    async fn configure(&self, _ctx: &dyn TaskContext) -> Result<(), EngineError> {
        Ok(())
    }
    async fn destroy(&self, _ctx: &dyn TaskContext) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_build(&self, ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        for _ in 0..2000u32 {
            ctx.cancel_check()?;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        ctx.cancel_check()
    }
    async fn image_publish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_remove(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_unpublish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_terminates_within_a_couple_polling_cycles() {
    init_tracing();
    providers().register("slow", |_data, _props| {
        Arc::new(SlowImageBuildProvider) as Arc<dyn Provider>
    });
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(state_resource(&dir), EngineOptions::default()).unwrap();
    engine
        .register("slow-one".to_string(), "slow".to_string(), Value::empty_map())
        .result(None)
        .await
        .unwrap();

    let handle = engine.offer("slow-one".to_string(), Value::empty_map());
    tokio::time::sleep(Duration::from_millis(5)).await;
    handle.cancel();

    let started = std::time::Instant::now();
    let err = handle
        .result(Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TaskCancelled));
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn unavailable_provider_lists_but_refuses_operations() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let text = "{\"platforms\":{\"x\":{\"provider\":\"does-not-exist\",\"properties\":{}}},\"layouts\":{}}\n";
    {
        let resource = state_resource(&dir);
        let mut stream = resource.open(stevedore_core::resource::OpenMode::Write).unwrap();
        std::io::Write::write_all(&mut stream, text.as_bytes()).unwrap();
    }

    let engine = Engine::open(state_resource(&dir), EngineOptions::default()).unwrap();
    assert_eq!(engine.platforms_snapshot(), vec![("x".to_string(), false)]);

    let err = engine
        .offer("x".to_string(), Value::empty_map())
        .result(None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAvailable(_)));
}

struct ProgressingProvider;

#[async_trait::async_trait]
impl Provider for ProgressingProvider {
    async fn configure(&self, ctx: &dyn TaskContext) -> Result<(), EngineError> {
        ctx.progress_track(0.25);
        ctx.progress(Some(1.0));
        ctx.progress_track(0.75);
        ctx.progress(Some(0.5));
        Ok(())
    }
    async fn destroy(&self, _ctx: &dyn TaskContext) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_build(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_publish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_remove(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_unpublish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
}

#[tokio::test]
async fn progress_aggregation_matches_the_documented_sequence() {
    init_tracing();
    providers().register("progressing", |_data, _props| {
        Arc::new(ProgressingProvider) as Arc<dyn Provider>
    });

    let dir = tempfile::tempdir().unwrap();
    let events = EventQueue::new();
    let engine = Engine::open(
        state_resource(&dir),
        EngineOptions {
            events: Some(events.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    engine
        .register("p".to_string(), "progressing".to_string(), Value::empty_map())
        .result(None)
        .await
        .unwrap();

    let mut emitted = Vec::new();
    loop {
        let ev = events.recv().await.unwrap();
        if let EventKind::Progress(Some(v)) = ev.kind {
            emitted.push(v);
        }
        if ev.is_finished() {
            break;
        }
    }
    assert_eq!(emitted, vec![0.0, 0.25, 0.25, 0.625]);
}

struct CustomEventProvider;

#[async_trait::async_trait]
impl Provider for CustomEventProvider {
    async fn configure(&self, _ctx: &dyn TaskContext) -> Result<(), EngineError> {
        Ok(())
    }
    async fn destroy(&self, _ctx: &dyn TaskContext) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_build(&self, ctx: &dyn TaskContext, image: &Value) -> Result<(), EngineError> {
        ctx.emit("image-tagged", image.clone());
        Ok(())
    }
    async fn image_publish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_remove(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
    async fn image_unpublish(&self, _ctx: &dyn TaskContext, _image: &Value) -> Result<(), EngineError> {
        Ok(())
    }
}

#[tokio::test]
async fn provider_emitted_custom_events_surface_on_the_queue() {
    init_tracing();
    providers().register("custom-events", |_data, _props| {
        Arc::new(CustomEventProvider) as Arc<dyn Provider>
    });

    let dir = tempfile::tempdir().unwrap();
    let events = EventQueue::new();
    let engine = Engine::open(
        state_resource(&dir),
        EngineOptions {
            events: Some(events.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    engine
        .register("c".to_string(), "custom-events".to_string(), Value::empty_map())
        .result(None)
        .await
        .unwrap();

    let image = Value::from("my-image:latest");
    engine
        .offer("c".to_string(), image.clone())
        .result(None)
        .await
        .unwrap();

    let mut saw_custom = false;
    loop {
        let ev = events.recv().await.unwrap();
        if let EventKind::Custom { name, payload } = &ev.kind {
            assert_eq!(name, "image-tagged");
            assert_eq!(payload, &image);
            saw_custom = true;
        }
        if ev.is_finished() && saw_custom {
            break;
        }
    }
    assert!(saw_custom);
}
