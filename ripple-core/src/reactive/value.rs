//! Dynamic values.
//!
//! Reactive containers, props and render contexts hold [`Value`]s. Plain
//! containers ([`Object`], [`Array`]) are shared raw targets; wrapping one with
//! [`Runtime::reactive`](super::Runtime::reactive) yields a [`Reactive`]
//! accessor that tracks reads and triggers on writes.
//!
//! Equality is strict and NaN-aware: primitives compare by value, shared
//! containers and callables by identity.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::computed::Computed;
use super::proxy::Reactive;
use super::refs::Ref;
use crate::graph::TargetId;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Array),
    Object(Object),
    Reactive(Reactive),
    Ref(Ref),
    Computed(Computed),
    Handler(Handler),
}

impl Value {
    /// Build a raw object value from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(entries.into_iter().collect())
    }

    /// Build a raw array value.
    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Strict, NaN-aware equality.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Computed(a), Value::Computed(b)) => a.ptr_eq(b),
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Raw objects and arrays: the inputs `reactive` actually wraps.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Value::Reactive(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Value::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Read through refs and computeds; anything else is returned as is.
    ///
    /// Reading a ref or computed this way tracks it like a direct read.
    pub fn unwrap_ref(&self) -> Value {
        match self {
            Value::Ref(r) => r.get(),
            Value::Computed(c) => c.get(),
            other => other.clone(),
        }
    }

    /// Truthiness in the usual scripting sense.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Text form used for text children and attribute values.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(a) => join_display(&a.to_vec()),
            Value::Reactive(r) if r.is_array() => join_display(&r.raw_items()),
            Value::Object(_) | Value::Reactive(_) | Value::Ref(_) | Value::Computed(_) => {
                "[object Object]".to_string()
            }
            Value::Handler(_) => "[function]".to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // -0 prints as 0.
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let s = format!("{n:e}");
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        }
    } else {
        // Shortest round-trip form; integral values have no fractional part.
        format!("{n}")
    }
}

fn join_display(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| if v.is_null() { String::new() } else { v.to_display_string() })
        .collect::<Vec<_>>()
        .join(",")
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(a) => a.fmt(f),
            Value::Object(o) => o.fmt(f),
            Value::Reactive(r) => r.fmt(f),
            Value::Ref(r) => r.fmt(f),
            Value::Computed(c) => c.fmt(f),
            Value::Handler(h) => h.fmt(f),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
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

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Computed> for Value {
    fn from(c: Computed) -> Self {
        Value::Computed(c)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ----------------------------------------------------------------------------
// Raw containers
// ----------------------------------------------------------------------------

struct ObjectInner {
    id: TargetId,
    entries: Mutex<IndexMap<String, Value>>,
}

/// A shared, insertion-ordered map. Reads and writes are untracked; wrap it
/// with `Runtime::reactive_object` to observe it.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

impl Object {
    pub fn new() -> Self {
        Self::from_map(IndexMap::new())
    }

    pub fn from_map(entries: IndexMap<String, Value>) -> Self {
        Self(Arc::new(ObjectInner {
            id: TargetId::new(),
            entries: Mutex::new(entries),
        }))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.entries.lock().get(key).cloned()
    }

    /// Insert and return the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.entries.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.entries.lock().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.entries.lock().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.lock().is_empty()
    }

    /// A new object with the same entries and a new identity.
    pub fn shallow_clone(&self) -> Object {
        Object::from_map(self.0.entries.lock().clone())
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Object::from_map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

struct ArrayInner {
    id: TargetId,
    items: Mutex<Vec<Value>>,
}

/// A shared growable list. Untracked, like [`Object`].
#[derive(Clone)]
pub struct Array(Arc<ArrayInner>);

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Arc::new(ArrayInner {
            id: TargetId::new(),
            items: Mutex::new(items),
        }))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.lock().get(index).cloned()
    }

    /// Write `value` at `index`, padding with nulls when writing past the end.
    ///
    /// Returns the previous value at `index`, if there was one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Option<Value> {
        let mut items = self.0.items.lock();
        let value = value.into();
        if index < items.len() {
            Some(std::mem::replace(&mut items[index], value))
        } else {
            items.resize(index, Value::Null);
            items.push(value);
            None
        }
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.items.lock().push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.lock().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.lock().clone()
    }

    pub fn shallow_clone(&self) -> Array {
        Array::from_vec(self.to_vec())
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Array::from_vec(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// An event delivered by the output adapter to a listener.
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// Lower-cased event name, e.g. `click` or `input`.
    pub name: String,
    /// The target's current `value`.
    pub value: Value,
    /// The target's current `checked` state.
    pub checked: bool,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// An event listener. Compared by identity.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&Event) + Send + Sync>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0))
    }
}
