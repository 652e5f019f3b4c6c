//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive containers,
//! computeds and effects. It owns the dependency graph, the active-effect
//! stack and the update scheduler.
//!
//! # How It Works
//!
//! 1. A read of a reactive slot calls [`Runtime::track`], which registers the
//!    innermost running effect (if any) against (target, key).
//!
//! 2. A write that changes a slot calls [`Runtime::trigger`], which notifies
//!    every effect registered against it. Effects with a scheduler hand the
//!    notification to it; plain effects re-run synchronously.
//!
//! 3. Component render effects schedule a job on the runtime's
//!    [`Scheduler`]; the host drains queued work with
//!    [`Runtime::run_microtasks`].
//!
//! # Instances
//!
//! There is no global state. A [`Runtime`] is a cheap handle to shared state,
//! and every primitive it creates keeps a handle back to it, so independent
//! runtimes (one per test, say) never observe each other.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::computed::Computed;
use super::context::{Frame, ReactiveContext};
use super::effect::ReactiveEffect;
use super::proxy::{ProxyInner, Reactive, Target};
use super::refs::Ref;
use super::subscriber::{EffectId, Subscriber};
use super::value::{Array, Object, Value};
use crate::config::RuntimeConfig;
use crate::graph::{DepKey, DependencyGraph, TargetId};
use crate::scheduler::{Job, NextTick, Scheduler};

struct RuntimeInner {
    config: RuntimeConfig,
    graph: Mutex<DependencyGraph>,
    stack: Mutex<Vec<Frame>>,
    /// raw target -> its proxy, at most one live proxy per target.
    proxies: DashMap<TargetId, Weak<ProxyInner>>,
    scheduler: Scheduler,
}

/// Handle to one reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let scheduler = Scheduler::new(config.scheduler.max_recursion);
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                graph: Mutex::new(DependencyGraph::new()),
                stack: Mutex::new(Vec::new()),
                proxies: DashMap::new(),
                scheduler,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Active-effect stack
    // ------------------------------------------------------------------------

    pub(crate) fn push_frame(&self, frame: Frame) {
        self.inner.stack.lock().push(frame);
    }

    pub(crate) fn pop_frame(&self) -> Option<Frame> {
        self.inner.stack.lock().pop()
    }

    fn active_subscriber(&self) -> Option<Arc<dyn Subscriber>> {
        self.inner.stack.lock().last().cloned().flatten()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        matches!(self.inner.stack.lock().last(), Some(Some(_)))
    }

    /// The effect that tracked reads are currently attributed to.
    pub fn active_effect_id(&self) -> Option<EffectId> {
        self.inner
            .stack
            .lock()
            .last()
            .and_then(|frame| frame.as_ref().map(|sub| sub.id()))
    }

    /// Run `f` with tracking suspended.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::untracked(self);
        f()
    }

    // ------------------------------------------------------------------------
    // Dependency graph
    // ------------------------------------------------------------------------

    /// Record that the active effect read (target, key).
    ///
    /// No-op when nothing is tracking.
    pub fn track(&self, target: TargetId, key: DepKey) {
        let Some(subscriber) = self.active_subscriber() else {
            return;
        };

        let added = self
            .inner
            .graph
            .lock()
            .track(target, key.clone(), &subscriber);

        if added {
            subscriber.record_dep(target, key);
        }
    }

    /// Notify every effect that read (target, key).
    ///
    /// The set is snapshotted before notifying, so effects that re-run and
    /// re-register do not extend the current notification pass. The effect
    /// that is currently running is never notified of its own writes.
    pub fn trigger(&self, target: TargetId, key: DepKey) {
        let subscribers = self.inner.graph.lock().subscribers(target, &key);
        if subscribers.is_empty() {
            return;
        }

        let running = self.active_effect_id();
        for subscriber in subscribers {
            if Some(subscriber.id()) == running {
                continue;
            }
            subscriber.notify();
        }
    }

    pub(crate) fn untrack(&self, target: TargetId, key: &DepKey, effect: EffectId) {
        self.inner.graph.lock().untrack(target, key, effect);
    }

    /// Number of live effects registered against (target, key).
    pub fn dependent_count(&self, target: TargetId, key: &DepKey) -> usize {
        self.inner.graph.lock().dependent_count(target, key)
    }

    /// Number of targets that currently have at least one dependent.
    pub fn tracked_target_count(&self) -> usize {
        self.inner.graph.lock().target_count()
    }

    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    /// Wrap a raw object or array reactively.
    ///
    /// Anything else (primitives, values that are already reactive, refs) is
    /// returned unchanged.
    pub fn reactive(&self, value: Value) -> Value {
        match value {
            Value::Object(object) => Value::Reactive(self.reactive_object(&object)),
            Value::Array(array) => Value::Reactive(self.reactive_array(&array)),
            other => other,
        }
    }

    /// The proxy for `object`, creating it on first use.
    pub fn reactive_object(&self, object: &Object) -> Reactive {
        self.proxy_for(object.id(), || Target::Object(object.clone()))
    }

    /// The proxy for `array`, creating it on first use.
    pub fn reactive_array(&self, array: &Array) -> Reactive {
        self.proxy_for(array.id(), || Target::Array(array.clone()))
    }

    fn proxy_for(&self, id: TargetId, target: impl FnOnce() -> Target) -> Reactive {
        let mut slot = self.inner.proxies.entry(id).or_insert_with(Weak::new);
        if let Some(existing) = slot.upgrade() {
            return Reactive::from_inner(existing);
        }

        let proxy = Reactive::wrap(self.clone(), target());
        *slot = proxy.downgrade();
        proxy
    }

    /// Forget the memo entry for `id` once its proxy is gone. A proxy created
    /// for the same target in the meantime keeps its entry.
    pub(crate) fn release_proxy(&self, id: TargetId) {
        self.inner
            .proxies
            .remove_if(&id, |_, proxy| proxy.strong_count() == 0);
    }

    /// Number of raw targets that currently have a live proxy.
    pub fn proxy_count(&self) -> usize {
        self.inner.proxies.len()
    }

    /// Create a ref holding `value`. Raw containers are wrapped reactively.
    pub fn create_ref(&self, value: impl Into<Value>) -> Ref {
        Ref::new(self.clone(), value.into())
    }

    /// Return `value` if it already is a ref, otherwise a new ref holding it.
    pub fn to_ref(&self, value: impl Into<Value>) -> Ref {
        match value.into() {
            Value::Ref(existing) => existing,
            other => self.create_ref(other),
        }
    }

    /// Read-only computed.
    pub fn computed<F, V>(&self, getter: F) -> Computed
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Computed::new(self.clone(), move || getter().into(), None)
    }

    /// Writable computed: writes are forwarded to `setter`.
    pub fn computed_with_setter<F, V, S>(&self, getter: F, setter: S) -> Computed
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Computed::new(
            self.clone(),
            move || getter().into(),
            Some(Box::new(setter)),
        )
    }

    /// Create an effect and run it once to collect its dependencies.
    pub fn effect<F>(&self, f: F) -> ReactiveEffect
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = ReactiveEffect::new(self.clone(), f);
        effect.run();
        effect
    }

    /// Create an effect without running it.
    pub fn effect_lazy<F>(&self, f: F) -> ReactiveEffect
    where
        F: Fn() + Send + Sync + 'static,
    {
        ReactiveEffect::new(self.clone(), f)
    }

    /// Create an effect whose notifications go to `scheduler` instead of
    /// re-running it. The effect runs once immediately.
    pub fn effect_with_scheduler<F, S>(&self, f: F, scheduler: S) -> ReactiveEffect
    where
        F: Fn() + Send + Sync + 'static,
        S: Fn(&ReactiveEffect) + Send + Sync + 'static,
    {
        let effect = ReactiveEffect::with_scheduler(self.clone(), f, scheduler);
        effect.run();
        effect
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    /// Queue a job for the next flush.
    pub fn queue_job(&self, job: Job) {
        self.inner.scheduler.queue_job(job);
    }

    /// Resolves after the pending flush, or on the next microtask if there is
    /// none.
    pub fn next_tick(&self) -> NextTick {
        self.inner.scheduler.next_tick(None)
    }

    /// Like [`next_tick`](Self::next_tick), running `f` first.
    pub fn next_tick_then<F>(&self, f: F) -> NextTick
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.scheduler.next_tick(Some(Box::new(f)))
    }

    /// Drain the microtask queue. Returns the number of microtasks run.
    pub fn run_microtasks(&self) -> usize {
        self.inner.scheduler.run_microtasks()
    }

    /// Whether a flush is scheduled or in progress.
    pub fn is_flush_pending(&self) -> bool {
        self.inner.scheduler.is_flush_pending()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("tracked_targets", &self.tracked_target_count())
            .field("pending_jobs", &self.inner.scheduler.pending_jobs())
            .finish()
    }
}
