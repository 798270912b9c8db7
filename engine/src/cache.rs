//! Read-through cache seam.
//!
//! Queries carrying a [`CacheDirective`] look their rows up in the named cache
//! before asking the transport, and store fresh rows afterwards. The engine
//! never invalidates entries; callers own cache lifetime.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which cache to use and under which key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDirective {
    pub key: String,
    pub config: String,
}

impl CacheDirective {
    pub fn new(key: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            config: config.into(),
        }
    }
}

/// Deterministic cache key for a primary-key lookup.
///
/// Built from the connection name, the collection name and the JSON encoding
/// of the key exactly as the caller supplied it.
pub fn get_cache_key(connection: &str, collection: &str, primary_key: &Value) -> String {
    format!("get:{connection}.{collection}{primary_key}")
}

/// A key/value cache for JSON documents.
pub trait Cache: Send + Sync {
    fn read(&self, key: &str) -> Option<Value>;
    fn write(&self, key: &str, value: Value);
    fn delete(&self, key: &str) -> bool;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Cache for MemoryCache {
    fn read(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn write(&self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_cache_key_encodes_key_as_json() {
        assert_eq!(get_cache_key("default", "articles", &json!(1)), "get:default.articles1");
        assert_eq!(
            get_cache_key("api", "tags", &json!(["a", 2])),
            r#"get:api.tags["a",2]"#
        );
    }

    #[test]
    fn memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.read("k").is_none());

        cache.write("k", json!({"rows": []}));
        assert_eq!(cache.read("k"), Some(json!({"rows": []})));
        assert_eq!(cache.len(), 1);

        assert!(cache.delete("k"));
        assert!(cache.is_empty());
    }
}
