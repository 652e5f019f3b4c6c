//! Ref Implementation
//!
//! A [`Ref`] is a single mutable cell. Reading it inside an effect registers
//! the effect against the ref itself; writing a different value notifies
//! those effects.
//!
//! Raw objects and arrays stored in a ref are wrapped reactively, so
//! `ref.get()` of an object returns a proxy whose own slots are tracked too.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::runtime::Runtime;
use super::value::Value;
use crate::graph::{DepKey, TargetId};

struct RefInner {
    id: TargetId,
    value: Mutex<Value>,
    runtime: Runtime,
}

/// A reactive single-value cell.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_ref(0);
///
/// count.set(5);
/// assert_eq!(count.get().as_f64(), Some(5.0));
/// ```
#[derive(Clone)]
pub struct Ref(Arc<RefInner>);

impl Ref {
    pub(crate) fn new(runtime: Runtime, value: Value) -> Self {
        let value = runtime.reactive(value);
        Self(Arc::new(RefInner {
            id: TargetId::new(),
            value: Mutex::new(value),
            runtime,
        }))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> Value {
        self.0.runtime.track(self.0.id, DepKey::Value);
        self.0.value.lock().clone()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.0.value.lock().clone()
    }

    /// Replace the value, notifying readers if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = self.0.runtime.reactive(value.into());
        {
            let mut slot = self.0.value.lock();
            if slot.same_value(&value) {
                return;
            }
            *slot = value;
        }
        self.0.runtime.trigger(self.0.id, DepKey::Value);
    }

    /// Set the value computed from the current one. The read is untracked.
    pub fn update<F, V>(&self, f: F)
    where
        F: FnOnce(&Value) -> V,
        V: Into<Value>,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.0.id)
            .field("value", &*self.0.value.lock())
            .finish()
    }
}
