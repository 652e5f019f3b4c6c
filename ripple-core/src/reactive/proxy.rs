//! Reactive containers.
//!
//! A [`Reactive`] is an explicit accessor over a raw [`Object`] or [`Array`].
//! Every read goes through [`Runtime::track`] and every changing write through
//! [`Runtime::trigger`], keyed by the raw target and the slot touched.
//!
//! Granularity is per container and key. Mutating the raw container directly
//! bypasses tracking.
//!
//! Nested raw containers are wrapped on the way out, so `state.get("user")`
//! of a nested object is itself reactive. Writes store raw values: writing a
//! proxy stores its target.

use std::fmt;
use std::sync::{Arc, Weak};

use super::runtime::Runtime;
use super::value::{Array, Object, Value};
use crate::graph::{DepKey, TargetId};

#[derive(Clone)]
pub(crate) enum Target {
    Object(Object),
    Array(Array),
}

impl Target {
    fn id(&self) -> TargetId {
        match self {
            Target::Object(o) => o.id(),
            Target::Array(a) => a.id(),
        }
    }
}

pub(crate) struct ProxyInner {
    target: Target,
    runtime: Runtime,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        self.runtime.release_proxy(self.target.id());
    }
}

/// Tracked accessor over a raw object or array.
///
/// Created with [`Runtime::reactive`]; there is at most one live proxy per raw
/// target, so proxies can be compared by identity.
#[derive(Clone)]
pub struct Reactive(Arc<ProxyInner>);

impl Reactive {
    pub(crate) fn wrap(runtime: Runtime, target: Target) -> Self {
        Self(Arc::new(ProxyInner { target, runtime }))
    }

    pub(crate) fn from_inner(inner: Arc<ProxyInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
        Arc::downgrade(&self.0)
    }

    /// Identity of the raw target.
    pub fn id(&self) -> TargetId {
        self.0.target.id()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.target, Target::Array(_))
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn track(&self, key: DepKey) {
        self.0.runtime.track(self.id(), key);
    }

    fn trigger(&self, key: DepKey) {
        self.0.runtime.trigger(self.id(), key);
    }

    fn wrap_nested(&self, value: Value) -> Value {
        self.0.runtime.reactive(value)
    }

    // ------------------------------------------------------------------------
    // Keyed access
    // ------------------------------------------------------------------------

    /// Read a property. On arrays, `"length"` and numeric keys are accepted.
    ///
    /// Missing keys read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        match &self.0.target {
            Target::Object(object) => {
                self.track(DepKey::from(key));
                object.get(key).map(|v| self.wrap_nested(v)).unwrap_or_default()
            }
            Target::Array(_) => match parse_index(key) {
                Some(index) => self.at(index),
                None if key == "length" => Value::from(self.len()),
                None => Value::Null,
            },
        }
    }

    /// Whether the key exists. Tracks the key.
    pub fn has(&self, key: &str) -> bool {
        match &self.0.target {
            Target::Object(object) => {
                self.track(DepKey::from(key));
                object.contains_key(key)
            }
            Target::Array(_) => parse_index(key).is_some_and(|i| i < self.len()),
        }
    }

    /// Write a property, notifying readers if the value changed.
    ///
    /// Adding a key to an object also notifies iteration (`len`, `keys`).
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = to_raw(value.into());
        match &self.0.target {
            Target::Object(object) => {
                let had_key = object.contains_key(key);
                let old = object.insert(key, value.clone());
                let changed = old.map_or(true, |old| !old.same_value(&value));
                if changed {
                    self.trigger(DepKey::from(key));
                }
                if !had_key {
                    self.trigger(DepKey::Length);
                }
            }
            Target::Array(_) => {
                if let Some(index) = parse_index(key) {
                    self.set_at(index, value);
                }
            }
        }
    }

    /// Delete an object key. Returns the removed value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let Target::Object(object) = &self.0.target else {
            return None;
        };
        let removed = object.remove(key)?;
        self.trigger(DepKey::from(key));
        self.trigger(DepKey::Length);
        Some(removed)
    }

    // ------------------------------------------------------------------------
    // Indexed access
    // ------------------------------------------------------------------------

    /// Read an array element. Out of range (or on an object) reads as `Null`.
    pub fn at(&self, index: usize) -> Value {
        let Target::Array(array) = &self.0.target else {
            return self.get(&index.to_string());
        };
        self.track(DepKey::Index(index));
        array.get(index).map(|v| self.wrap_nested(v)).unwrap_or_default()
    }

    /// Write an array element, padding with nulls past the end.
    ///
    /// Notifies the index if the value changed, and `length` if the write
    /// grew the array.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) {
        let Target::Array(array) = &self.0.target else {
            self.set(&index.to_string(), value);
            return;
        };

        let value = to_raw(value.into());
        let old_len = array.len();
        let previous = array.set(index, value.clone());
        let changed = previous.map_or(true, |old| !old.same_value(&value));

        if changed {
            self.trigger(DepKey::Index(index));
        }
        if array.len() != old_len {
            self.trigger(DepKey::Length);
        }
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) {
        match &self.0.target {
            Target::Array(array) => self.set_at(array.len(), value),
            Target::Object(_) => {}
        }
    }

    /// Number of elements (arrays) or keys (objects). Tracks `length`.
    pub fn len(&self) -> usize {
        self.track(DepKey::Length);
        match &self.0.target {
            Target::Object(object) => object.len(),
            Target::Array(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Object keys in insertion order, or array indices as strings.
    /// Tracks `length`.
    pub fn keys(&self) -> Vec<String> {
        self.track(DepKey::Length);
        match &self.0.target {
            Target::Object(object) => object.keys(),
            Target::Array(array) => (0..array.len()).map(|i| i.to_string()).collect(),
        }
    }

    /// Tracked `(key, value)` pairs, with nested containers wrapped.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------------

    /// The raw target as a value.
    pub fn to_raw(&self) -> Value {
        match &self.0.target {
            Target::Object(object) => Value::Object(object.clone()),
            Target::Array(array) => Value::Array(array.clone()),
        }
    }

    /// A new raw container with the current entries. Untracked.
    pub fn snapshot(&self) -> Value {
        match &self.0.target {
            Target::Object(object) => Value::Object(object.shallow_clone()),
            Target::Array(array) => Value::Array(array.shallow_clone()),
        }
    }

    /// Untracked raw `(key, value)` pairs of an object. Empty for arrays.
    pub fn raw_entries(&self) -> Vec<(String, Value)> {
        match &self.0.target {
            Target::Object(object) => object.entries(),
            Target::Array(_) => Vec::new(),
        }
    }

    /// Untracked raw elements of an array. Empty for objects.
    pub fn raw_items(&self) -> Vec<Value> {
        match &self.0.target {
            Target::Array(array) => array.to_vec(),
            Target::Object(_) => Vec::new(),
        }
    }
}

fn to_raw(value: Value) -> Value {
    match value {
        Value::Reactive(proxy) => proxy.to_raw(),
        other => other,
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.target {
            Target::Object(object) => f.debug_tuple("Reactive").field(object).finish(),
            Target::Array(array) => f.debug_tuple("Reactive").field(array).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveEffect;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn reactive(runtime: &Runtime, value: Value) -> Reactive {
        match runtime.reactive(value) {
            Value::Reactive(r) => r,
            other => panic!("expected a proxy, got {other:?}"),
        }
    }

    fn counting_effect(
        runtime: &Runtime,
        f: impl Fn() + Send + Sync + 'static,
    ) -> (Arc<AtomicI32>, ReactiveEffect) {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let effect = runtime.effect(move || {
            f();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        (runs, effect)
    }

    #[test]
    fn nested_objects_are_wrapped() {
        let runtime = Runtime::new();
        let inner = Object::new();
        inner.insert("name", "Ada");
        let state = reactive(&runtime, Value::object([("user", inner.clone())]));

        let user = state.get("user");
        let user = user.as_reactive().expect("nested proxy");
        assert!(user.ptr_eq(&runtime.reactive_object(&inner)));
        assert_eq!(user.get("name"), Value::from("Ada"));
    }

    #[test]
    fn nan_write_over_nan_does_not_trigger() {
        let runtime = Runtime::new();
        let state = reactive(&runtime, Value::object([("x", f64::NAN)]));

        let reader = state.clone();
        let (runs, _effect) = counting_effect(&runtime, move || {
            reader.get("x");
        });

        state.set("x", f64::NAN);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        state.set("x", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn adding_a_key_notifies_iteration() {
        let runtime = Runtime::new();
        let state = reactive(&runtime, Value::object([("a", 1)]));

        let reader = state.clone();
        let (runs, _effect) = counting_effect(&runtime, move || {
            reader.keys();
        });

        state.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        state.set("b", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        state.remove("a");
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn array_growth_notifies_length() {
        let runtime = Runtime::new();
        let list = reactive(&runtime, Value::array([1, 2]));

        let reader = list.clone();
        let (runs, _effect) = counting_effect(&runtime, move || {
            reader.len();
        });

        list.set_at(0, 10);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        list.push(3);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(list.get("length"), Value::from(3));
        assert_eq!(list.get("2"), Value::from(3));
    }

    #[test]
    fn index_readers_see_index_writes() {
        let runtime = Runtime::new();
        let list = reactive(&runtime, Value::array(["a", "b"]));

        let reader = list.clone();
        let (runs, _effect) = counting_effect(&runtime, move || {
            reader.at(1);
        });

        list.set_at(0, "z");
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        list.set_at(1, "y");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn writing_a_proxy_stores_its_target() {
        let runtime = Runtime::new();
        let child = reactive(&runtime, Value::object([("n", 1)]));
        let parent = reactive(&runtime, Value::object::<&str, Value>([]));

        parent.set("child", child.clone());
        let raw = parent.raw_entries();
        assert!(matches!(raw[0].1, Value::Object(_)));
        assert_eq!(parent.get("child"), Value::Reactive(child));
    }

    #[test]
    fn snapshot_is_a_new_raw_container() {
        let runtime = Runtime::new();
        let state = reactive(&runtime, Value::object([("color", "red")]));

        let snap = state.snapshot();
        state.set("color", "blue");

        let Value::Object(snap) = snap else {
            panic!("expected raw object");
        };
        assert_eq!(snap.get("color"), Some(Value::from("red")));
    }

    #[test]
    fn numeric_keys_parse_strictly() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("length"), None);
    }
}
