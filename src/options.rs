//! Registration keyed option lists.
//!
//! Used for node options, node tags, graph options and the request queue of
//! a pixel access ticket. Keys are registration strings, so lookups accept
//! the same patterns as [`registration_match`].

use crate::registration::{registration_key, registration_match};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key suffix marking options that upstream nodes want merged into a
/// ticket's request queue before they are pulled.
pub const RESOLVE_LEVEL: &str = "resolve";

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(v) => Some(*v),
            OptionValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::String(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::String(v)
    }
}

/// One registration keyed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub registration: String,
    pub value: OptionValue,
}

/// Ordered option list; registrations are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    entries: Vec<OptionEntry>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionEntry> {
        self.entries.iter()
    }

    /// Insert or replace the value stored under `registration`.
    pub fn set(&mut self, registration: impl Into<String>, value: impl Into<OptionValue>) {
        let registration = registration.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|e| e.registration == registration)
        {
            Some(entry) => entry.value = value,
            None => self.entries.push(OptionEntry {
                registration,
                value,
            }),
        }
    }

    /// Exact registration lookup.
    pub fn get(&self, registration: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|e| e.registration == registration)
            .map(|e| &e.value)
    }

    /// First entry whose registration matches `pattern`.
    pub fn find(&self, pattern: &str) -> Option<&OptionEntry> {
        self.entries
            .iter()
            .find(|e| registration_match(&e.registration, pattern) > 0)
    }

    /// First entry whose last level key equals `key`.
    pub fn find_key(&self, key: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|e| registration_key(&e.registration) == key)
            .map(|e| &e.value)
    }

    pub fn find_bool(&self, pattern: &str) -> Option<bool> {
        self.find(pattern).and_then(|e| e.value.as_bool())
    }

    pub fn find_int(&self, pattern: &str) -> Option<i64> {
        self.find(pattern).and_then(|e| e.value.as_int())
    }

    pub fn find_str(&self, pattern: &str) -> Option<&str> {
        self.find(pattern).and_then(|e| e.value.as_str())
    }

    /// Remove every entry matching `pattern`; returns how many went away.
    pub fn remove(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| registration_match(&e.registration, pattern) == 0);
        before - self.entries.len()
    }

    /// Entries matching `pattern`, in order.
    pub fn filter(&self, pattern: &str) -> Options {
        Options {
            entries: self
                .entries
                .iter()
                .filter(|e| registration_match(&e.registration, pattern) > 0)
                .cloned()
                .collect(),
        }
    }

    /// Entries carrying a `resolve` level, i.e. requests for upstream nodes.
    pub fn resolve_requests(&self) -> Options {
        Options {
            entries: self
                .entries
                .iter()
                .filter(|e| is_resolve_key(&e.registration))
                .cloned()
                .collect(),
        }
    }

    /// Append entries from `other` whose registration is not yet present.
    pub fn union(&mut self, other: &Options) {
        for entry in &other.entries {
            if self.get(&entry.registration).is_none() {
                self.entries.push(entry.clone());
            }
        }
    }
}

fn is_resolve_key(registration: &str) -> bool {
    registration
        .split(crate::registration::LEVEL_SEPARATOR)
        .any(|level| level.split('.').any(|k| k == RESOLVE_LEVEL))
}

impl FromIterator<(String, OptionValue)> for Options {
    fn from_iter<T: IntoIterator<Item = (String, OptionValue)>>(iter: T) -> Self {
        let mut options = Options::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_existing() {
        let mut opts = Options::new();
        opts.set("org/imaging/icc/rendering_intent", 0i64);
        opts.set("org/imaging/icc/rendering_intent", 1i64);
        assert_eq!(opts.len(), 1);
        assert_eq!(opts.find_int("rendering_intent"), Some(1));
    }

    #[test]
    fn test_union_keeps_existing_values() {
        let mut queue = Options::new();
        queue.set("org/imaging/resolve/pixel_layout", 3i64);

        let mut node_opts = Options::new();
        node_opts.set("org/imaging/resolve/pixel_layout", 4i64);
        node_opts.set("org/imaging/resolve/depth", 8i64);

        queue.union(&node_opts);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.find_int("pixel_layout"), Some(3));
    }

    #[test]
    fn test_resolve_requests_filter() {
        let mut opts = Options::new();
        opts.set("org/imaging/resolve/pixel_layout", 4i64);
        opts.set("org/imaging/icc/profile_name", "sRGB");
        let requests = opts.resolve_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests.find_key("pixel_layout").is_some());
    }

    #[test]
    fn test_remove_by_pattern() {
        let mut opts = Options::new();
        opts.set("org/graph/dirty", true);
        opts.set("org/graph/tag", "x");
        assert_eq!(opts.remove("dirty"), 1);
        assert!(opts.find_bool("dirty").is_none());
        assert_eq!(opts.len(), 1);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(OptionValue::from("sRGB").to_string(), "\"sRGB\"");
        assert_eq!(OptionValue::from(2i64).to_string(), "2");
    }
}
