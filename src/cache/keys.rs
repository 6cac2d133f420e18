//! Cache key definitions.
//!
//! A [`QueryDescriptor`] names a cacheable read and the parameters that affect
//! its result. Its [`CacheKey`] is derived from a canonical serialization so
//! that semantically identical calls always land on the same entry.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Identifies a cacheable read against the CMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    name: String,
    params: BTreeMap<String, Value>,
}

impl QueryDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Attach a parameter. Values that fail to serialize are stored as `null`.
    pub fn param(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.params.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derive the cache key.
    ///
    /// Parameters live in a `BTreeMap`, so nested objects are the only place
    /// key order could leak in; those are canonicalized before rendering.
    pub fn key(&self) -> CacheKey {
        if self.params.is_empty() {
            return CacheKey(self.name.clone());
        }

        let params: BTreeMap<&str, Value> = self
            .params
            .iter()
            .map(|(key, value)| (key.as_str(), canonicalize(value)))
            .collect();
        let rendered = serde_json::to_string(&params).unwrap_or_default();
        CacheKey(format!("{}:{rendered}", self.name))
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical cache key rendered from a [`QueryDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label grouping cache entries for bulk eviction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvalidationTag(String);

impl InvalidationTag {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn categories() -> Self {
        Self::new("categories")
    }

    pub fn category(slug: &str) -> Self {
        Self(format!("category-{slug}"))
    }

    pub fn tags() -> Self {
        Self::new("tags")
    }

    pub fn tag(slug: &str) -> Self {
        Self(format!("tag-{slug}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvalidationTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
