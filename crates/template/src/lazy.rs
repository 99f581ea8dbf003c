// SPDX-License-Identifier: MIT

//! The lazy resolvable view over a property bag (§4.2): wrapping a
//! `Value::Map` costs nothing up front, and each `resolve(key)` call
//! walks only the subtree reachable from that key, substituting
//! `#{expr}` placeholders in string leaves as it goes.

use crate::resolver::resolve;
use stevedore_core::provider::ResolvableProperties;
use stevedore_core::Value;

/// A read-only, lazily-resolving view over a `Value::Map` property bag.
/// Expressions resolve free variables against the same bag.
pub struct LazyView {
    raw: Value,
}

impl LazyView {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        self.raw.get(key).map(|v| self.resolve_value(v))
    }

    fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::Str(s) => match resolve(s, &|k| self.lookup(k)) {
                Ok(text) => Value::Str(text),
                // An unresolvable placeholder surfaces the original text
                // rather than failing the whole view; callers needing the
                // error should call `try_resolve`.
                Err(_) => Value::Str(s.clone()),
            },
            Value::Number(n) => Value::Number(*n),
            Value::List(items) => Value::List(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
        }
    }

    /// Resolves `key`, surfacing the first placeholder error encountered
    /// rather than silently passing through unresolved text.
    pub fn try_resolve(&self, key: &str) -> Result<Option<Value>, crate::error::TemplateError> {
        let Some(raw_child) = self.raw.get(key) else {
            return Ok(None);
        };
        self.try_resolve_value(raw_child).map(Some)
    }

    fn try_resolve_value(&self, value: &Value) -> Result<Value, crate::error::TemplateError> {
        match value {
            Value::Str(s) => resolve(s, &|k| self.lookup(k)).map(Value::Str),
            Value::Number(n) => Ok(Value::Number(*n)),
            Value::List(items) => {
                let resolved: Result<Vec<Value>, _> =
                    items.iter().map(|v| self.try_resolve_value(v)).collect();
                Ok(Value::List(resolved?))
            }
            Value::Map(map) => {
                let mut out = indexmap::IndexMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.try_resolve_value(v)?);
                }
                Ok(Value::Map(out))
            }
        }
    }
}

impl ResolvableProperties for LazyView {
    fn resolve(&self, key: &str) -> Option<Value> {
        self.lookup(key)
    }

    fn raw(&self) -> &Value {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn map_of(entries: &[(&str, Value)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in entries {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn resolves_string_leaf_against_sibling() {
        let view = LazyView::new(map_of(&[
            ("host", Value::from("db")),
            ("url", Value::from("tcp://#{host}:5432")),
        ]));
        assert_eq!(view.resolve("url"), Some(Value::from("tcp://db:5432")));
    }

    #[test]
    fn resolves_nested_map_leaves() {
        let inner = map_of(&[("greeting", Value::from("hi #{name}"))]);
        let view = LazyView::new(map_of(&[("name", Value::from("sam")), ("nested", inner)]));
        let resolved = view.resolve("nested").unwrap();
        assert_eq!(
            resolved.get("greeting"),
            Some(&Value::from("hi sam"))
        );
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let view = LazyView::new(map_of(&[]));
        assert_eq!(view.resolve("missing"), None);
    }

    #[test]
    fn try_resolve_surfaces_unknown_property_error() {
        let view = LazyView::new(map_of(&[("url", Value::from("#{missing}"))]));
        assert!(view.try_resolve("url").is_err());
    }
}
