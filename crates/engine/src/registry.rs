// SPDX-License-Identifier: MIT

//! The platform registry (§4.6): a coarse-locked, insertion-ordered map
//! from platform name to platform stub.

use crate::stub::PlatformStub;
use indexmap::IndexMap;
use parking_lot::Mutex;
use stevedore_core::{EngineError, Resource, Value};

/// Thread-safe `name -> PlatformStub` map. A single lock guards every
/// operation; callers needing atomicity across several calls (e.g.
/// "create, then configure, then put") must sequence them explicitly —
/// `create` deliberately does not insert, so a failed `configure` never
/// leaves a half-registered platform behind.
pub struct PlatformRegistry {
    entries: Mutex<IndexMap<String, PlatformStub>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Builds a stub bound to `state_resource.parent().ref("platforms").ref(name)`
    /// as its data resource, without publishing it to the registry.
    pub fn create(
        &self,
        name: &str,
        provider: &str,
        properties: Value,
        state_resource: &dyn Resource,
    ) -> Result<PlatformStub, EngineError> {
        let data_resource = state_resource
            .parent()
            .ref_child("platforms")?
            .ref_child(name)?;
        Ok(PlatformStub::new(provider.to_string(), properties, data_resource))
    }

    pub fn put(&self, name: String, stub: PlatformStub) -> Result<(), EngineError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&name) {
            return Err(EngineError::AlreadyExists(name));
        }
        entries.insert(name, stub);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<PlatformStub, EngineError> {
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Result<PlatformStub, EngineError> {
        self.entries
            .lock()
            .shift_remove(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn items(&self) -> Vec<(String, PlatformStub)> {
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

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_core::resource::from_uri;

    fn state_resource(dir: &tempfile::TempDir) -> Box<dyn Resource> {
        from_uri(&format!("file://{}/state.json", dir.path().display())).unwrap()
    }

    #[test]
    fn put_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlatformRegistry::new();
        let res = state_resource(&dir);
        let stub = registry
            .create("local", "echo", Value::empty_map(), res.as_ref())
            .unwrap();
        registry.put("local".to_string(), stub.clone()).unwrap();
        let err = registry.put("local".to_string(), stub).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    #[test]
    fn get_and_remove_fail_not_found() {
        let registry = PlatformRegistry::new();
        assert!(matches!(
            registry.get("missing").unwrap_err(),
            EngineError::NotFound(_)
        ));
        assert!(matches!(
            registry.remove("missing").unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[test]
    fn items_preserve_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlatformRegistry::new();
        let res = state_resource(&dir);
        for name in ["b", "a", "c"] {
            let stub = registry
                .create(name, "echo", Value::empty_map(), res.as_ref())
                .unwrap();
            registry.put(name.to_string(), stub).unwrap();
        }
        let names: Vec<_> = registry.items().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
