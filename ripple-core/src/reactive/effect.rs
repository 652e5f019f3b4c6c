//! Effect Implementation
//!
//! A [`ReactiveEffect`] wraps a function whose reactive reads are tracked.
//! When any slot it read changes, the effect is notified: if it carries a
//! scheduler the scheduler decides what to do (queue a render job, mark a
//! computed dirty), otherwise the effect re-runs synchronously.
//!
//! # Dependency bookkeeping
//!
//! Every run starts by removing the effect from all dependency sets it joined
//! during the previous run, then re-collects them. An effect therefore belongs
//! exactly to the sets of the slots it read in its most recent tracked run.
//!
//! # Stopping
//!
//! [`ReactiveEffect::stop`] detaches the effect from the graph. A stopped
//! effect can still be run by hand; its reads are then untracked, so it never
//! reacts again.
//!
//! The dependency graph only holds weak references. Dropping the last handle
//! to an effect removes it from every dependency set it joined.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};
use crate::graph::{DepKey, TargetId};

type EffectFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type SchedulerFn<T> = Box<dyn Fn(&ReactiveEffect<T>) + Send + Sync>;

pub(crate) struct EffectInner<T: 'static> {
    id: EffectId,
    runtime: Runtime,
    func: EffectFn<T>,
    scheduler: Option<SchedulerFn<T>>,
    active: AtomicBool,
    /// Slots this effect is registered in, for cleanup.
    deps: Mutex<SmallVec<[(TargetId, DepKey); 4]>>,
    run_count: AtomicUsize,
}

/// A tracked computation.
///
/// Handles are cheap to clone and share all state.
pub struct ReactiveEffect<T: 'static = ()> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub fn new<F>(runtime: Runtime, func: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(runtime, Box::new(func), None)
    }

    /// Create an effect whose notifications are routed to `scheduler`.
    pub fn with_scheduler<F, S>(runtime: Runtime, func: F, scheduler: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn(&ReactiveEffect<T>) + Send + Sync + 'static,
    {
        Self::build(runtime, Box::new(func), Some(Box::new(scheduler)))
    }

    fn build(runtime: Runtime, func: EffectFn<T>, scheduler: Option<SchedulerFn<T>>) -> Self {
        Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                runtime,
                func,
                scheduler,
                active: AtomicBool::new(true),
                deps: Mutex::new(SmallVec::new()),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Run the function, re-collecting dependencies.
    pub fn run(&self) -> T {
        let inner = &self.inner;
        inner.run_count.fetch_add(1, Ordering::Relaxed);

        if !inner.active.load(Ordering::SeqCst) {
            return inner.runtime.untracked(|| (inner.func)());
        }

        self.cleanup();

        let subscriber: Arc<dyn Subscriber> = self.inner.clone();
        let _ctx = ReactiveContext::enter(&inner.runtime, subscriber);
        (inner.func)()
    }

    /// Detach from every dependency set. Idempotent.
    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of times the function has been invoked.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of slots the effect is currently registered in.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    fn cleanup(&self) {
        self.inner.untrack_all();
    }
}

impl<T: 'static> EffectInner<T> {
    fn untrack_all(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for (target, key) in deps {
            self.runtime.untrack(target, &key, self.id);
        }
    }
}

impl<T: 'static> Drop for EffectInner<T> {
    fn drop(&mut self) {
        self.untrack_all();
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn record_dep(&self, target: TargetId, key: DepKey) {
        self.deps.lock().push((target, key));
    }

    fn notify(self: Arc<Self>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let effect = ReactiveEffect { inner: self };
        match &effect.inner.scheduler {
            Some(scheduler) => scheduler(&effect),
            None => {
                effect.run();
            }
        }
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .field("scheduled", &self.inner.scheduler.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
