//! Graph Keys
//!
//! Identifiers for the two levels of the dependency graph: the reactive
//! container being read (target) and the slot within it (key).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a reactive target (raw object, raw array, ref or
/// computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The slot of a target that a read touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named property of an object.
    Prop(String),
    /// An index of an array.
    Index(usize),
    /// The synthetic length of an array.
    Length,
    /// The single value held by a ref or computed.
    Value,
}

impl From<&str> for DepKey {
    fn from(key: &str) -> Self {
        DepKey::Prop(key.to_string())
    }
}

impl From<String> for DepKey {
    fn from(key: String) -> Self {
        DepKey::Prop(key)
    }
}

impl From<usize> for DepKey {
    fn from(index: usize) -> Self {
        DepKey::Index(index)
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(name) => f.write_str(name),
            DepKey::Index(index) => write!(f, "{index}"),
            DepKey::Length => f.write_str("length"),
            DepKey::Value => f.write_str("value"),
        }
    }
}
