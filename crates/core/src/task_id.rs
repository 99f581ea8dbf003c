// SPDX-License-Identifier: MIT

//! Internal task identifier used to tag events in the queue (§3, §4.4).
//!
//! This is distinct from the engine task *handle* (§3 "Identity-only
//! value; equality is reference equality"), which lives in
//! `stevedore-engine` and compares by pointer. `TaskId` only needs to
//! disambiguate which task an `Event` belongs to as it travels through the
//! queue.

use std::borrow::Borrow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(format!("task-{}", nanoid::nanoid!(12)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_tagged() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("task-"));
    }
}
