// SPDX-License-Identifier: MIT

//! The structured-value data model (§3 "Engine state", §4.3): number,
//! string, list, map. Shared by the codec, the template resolver's lazy
//! view, and the engine's property bags.

use indexmap::IndexMap;

/// A structured value: the engine's equivalent of a JSON value, with map
/// keys kept in insertion order (canonical form sorts most maps on write,
/// see `stevedore-codec::write_canonical`/`write_canonical_with`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn empty_map() -> Value {
        Value::Map(IndexMap::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_get_round_trips_inserted_key() {
        let mut m = IndexMap::new();
        m.insert("a".to_string(), Value::from("1"));
        let v = Value::Map(m);
        assert_eq!(v.get("a").and_then(Value::as_str), Some("1"));
        assert_eq!(v.get("missing"), None);
    }
}
