//! Tag Sets
//!
//! Ordered key/value pairs attached to every measurement an instrument
//! forwards. Backends receive the pairs in insertion order; the canonical
//! serialized form is only used for logging and equality checks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single key/value pair.
///
/// Keys are expected to match `^[a-zA-Z_][a-zA-Z0-9_]*$`. A key starting with
/// `__` is reserved: it is accepted here and escaped by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Check a key against `^[a-zA-Z_][a-zA-Z0-9_]*$`.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether the key uses the reserved `__` prefix.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with("__")
}

/// Ordered collection of tags owned by one instrument.
///
/// Duplicate keys are legal; both pairs are forwarded to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag unconditionally.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.push(Tag::new(key, value));
    }

    /// Append every entry of an unordered map. Empty maps are a no-op.
    pub fn merge(&mut self, tags: &HashMap<String, String>) {
        if tags.is_empty() {
            return;
        }
        self.tags.reserve(tags.len());
        for (key, value) in tags {
            self.add(key.as_str(), value.as_str());
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Canonical JSON object keyed by tag key.
    ///
    /// Independent of insertion order; for duplicated keys the value added
    /// last wins.
    pub fn serialize(&self) -> String {
        let canonical: BTreeMap<&str, &str> = self
            .tags
            .iter()
            .map(|tag| (tag.key.as_str(), tag.value.as_str()))
            .collect();
        serde_json::to_string(&canonical).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().map(|(k, v)| Tag::new(k, v)).collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
