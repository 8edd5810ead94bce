//! The storage engine contract and its in-memory reference implementation.
//!
//! Kept narrow on purpose: a file-backed hashmap or B+tree could implement
//! the same [`Engine`] trait without [`kv_storage`](../kv_storage)'s write
//! path changing at all.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("key not found")]
    KeyNotFound,
}

/// A mapping from string key to string value.
///
/// The in-memory variant is not internally thread-safe — callers (the
/// storage pipeline) are the single writer path and are responsible for
/// serializing access.
pub trait Engine: Send {
    fn set(&mut self, key: &str, value: &str);
    fn get(&self, key: &str) -> Result<String, EngineError>;
    /// Removing an absent key is a no-op, not an error.
    fn delete(&mut self, key: &str);
}

/// Reference implementation: a plain `HashMap`.
#[derive(Default)]
pub struct InMemoryEngine {
    data: HashMap<String, String>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Engine for InMemoryEngine {
    fn set(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Result<String, EngineError> {
        self.data
            .get(key)
            .cloned()
            .ok_or(EngineError::KeyNotFound)
    }

    fn delete(&mut self, key: &str) {
        self.data.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let mut e = InMemoryEngine::new();
        e.set("foo", "bar");
        assert_eq!(e.get("foo").unwrap(), "bar");
    }

    #[test]
    fn get_missing_key_errors() {
        let e = InMemoryEngine::new();
        assert_eq!(e.get("missing").unwrap_err(), EngineError::KeyNotFound);
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let mut e = InMemoryEngine::new();
        e.delete("missing");
        assert!(e.is_empty());
    }

    #[test]
    fn set_overwrites_existing_value() {
        let mut e = InMemoryEngine::new();
        e.set("foo", "bar");
        e.set("foo", "baz");
        assert_eq!(e.get("foo").unwrap(), "baz");
    }

    #[test]
    fn delete_removes_key() {
        let mut e = InMemoryEngine::new();
        e.set("foo", "bar");
        e.delete("foo");
        assert_eq!(e.get("foo").unwrap_err(), EngineError::KeyNotFound);
    }
}
