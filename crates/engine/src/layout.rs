// SPDX-License-Identifier: MIT

//! Layout stubs and registry — a supplemented feature, not named by the
//! platform-execution core spec but present in the reference engine's
//! `__LayoutStubs`/`__LayoutStub` alongside platforms. Kept structurally
//! symmetric with the platform registry, minus provider binding: layout
//! realization (`emerge`) stays a no-op, so a stub here is just a
//! resource and a property bag worth persisting and listing.

use indexmap::IndexMap;
use parking_lot::Mutex;
use stevedore_core::{EngineError, Resource, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct LayoutStub {
    resource: Arc<dyn Resource>,
    properties: Value,
}

impl std::fmt::Debug for LayoutStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutStub")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl LayoutStub {
    pub fn new(resource: Box<dyn Resource>, properties: Value) -> Self {
        Self {
            resource: Arc::from(resource),
            properties,
        }
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }
}

#[derive(Default)]
pub struct LayoutRegistry {
    entries: Mutex<IndexMap<String, LayoutStub>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, name: String, stub: LayoutStub) -> Result<(), EngineError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&name) {
            return Err(EngineError::AlreadyExists(name));
        }
        entries.insert(name, stub);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<LayoutStub, EngineError> {
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Result<LayoutStub, EngineError> {
        self.entries
            .lock()
            .shift_remove(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn items(&self) -> Vec<(String, LayoutStub)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_core::resource::from_uri;

    fn resource() -> Box<dyn Resource> {
        let dir = tempfile::tempdir().unwrap();
        from_uri(&format!("file://{}/layout.json", dir.path().display())).unwrap()
    }

    #[test]
    fn put_get_remove_round_trip() {
        let registry = LayoutRegistry::new();
        let stub = LayoutStub::new(resource(), Value::empty_map());
        registry.put("web".to_string(), stub).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("web").is_ok());
        registry.remove("web").unwrap();
        assert!(matches!(
            registry.get("web").unwrap_err(),
            EngineError::NotFound(_)
        ));
    }
}
