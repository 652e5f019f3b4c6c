//! Computed Implementation
//!
//! A [`Computed`] is a cached derived value backed by a lazy effect.
//!
//! # How Computeds Work
//!
//! 1. The getter does not run until the first read.
//!
//! 2. A read recomputes only when the computed is dirty, then caches the
//!    result.
//!
//! 3. When a source changes, the backing effect's scheduler marks the
//!    computed dirty and notifies the computed's own readers. Nothing is
//!    recomputed until someone reads again.
//!
//! Readers depend on the computed itself (its `Value` slot), not on its
//! sources, so an outer effect that reads a computed is re-run exactly when
//! the computed is invalidated.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use super::value::Value;
use crate::graph::{DepKey, TargetId};

type Setter = Box<dyn Fn(Value) + Send + Sync>;

struct ComputedInner {
    id: TargetId,
    runtime: Runtime,
    dirty: Arc<AtomicBool>,
    value: Mutex<Value>,
    effect: ReactiveEffect<Value>,
    setter: Option<Setter>,
}

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed(Arc<ComputedInner>);

impl Computed {
    pub(crate) fn new<F>(runtime: Runtime, getter: F, setter: Option<Setter>) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let id = TargetId::new();
        let dirty = Arc::new(AtomicBool::new(true));

        let effect = {
            let dirty = dirty.clone();
            let runtime = runtime.clone();
            ReactiveEffect::with_scheduler(runtime.clone(), getter, move |_| {
                if !dirty.swap(true, Ordering::SeqCst) {
                    runtime.trigger(id, DepKey::Value);
                }
            })
        };

        Self(Arc::new(ComputedInner {
            id,
            runtime,
            dirty,
            value: Mutex::new(Value::Null),
            effect,
            setter,
        }))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// Get the value, recomputing first if a source changed.
    pub fn get(&self) -> Value {
        let inner = &self.0;
        if inner.dirty.load(Ordering::SeqCst) {
            let value = inner.effect.run();
            *inner.value.lock() = value;
            inner.dirty.store(false, Ordering::SeqCst);
        }

        inner.runtime.track(inner.id, DepKey::Value);
        inner.value.lock().clone()
    }

    /// Forward a write to the setter.
    ///
    /// Read-only computeds ignore the write and log a warning.
    pub fn set(&self, value: impl Into<Value>) {
        match &self.0.setter {
            Some(setter) => setter(value.into()),
            None => warn!(
                computed = self.0.id.raw(),
                "write operation failed: computed value is readonly"
            ),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.load(Ordering::SeqCst)
    }

    pub fn is_writable(&self) -> bool {
        self.0.setter.is_some()
    }

    /// The backing effect. Stopping it freezes the computed.
    pub fn effect(&self) -> &ReactiveEffect<Value> {
        &self.0.effect
    }

    pub fn ptr_eq(&self, other: &Computed) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.0.id)
            .field("dirty", &self.is_dirty())
            .field("value", &*self.0.value.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
