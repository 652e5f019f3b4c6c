//! Reactive Primitives
//!
//! This module implements the reactivity engine: reactive containers, refs,
//! computeds and effects, all created from a [`Runtime`].
//!
//! # Concepts
//!
//! ## Reactive containers
//!
//! [`Runtime::reactive`] wraps a raw object or array in a [`Reactive`]
//! accessor. Reads register the running effect against (container, key);
//! writes that change a slot notify the effects registered against it.
//!
//! ## Refs
//!
//! A [`Ref`] is a single tracked cell.
//!
//! ## Computeds
//!
//! A [`Computed`] is a cached derived value. It recomputes lazily, only after
//! a source changed and only when read.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a tracked computation that re-runs (or hands off to
//! its scheduler) when something it read changes. Component rendering is an
//! effect whose scheduler queues a job on the update scheduler.
//!
//! # Implementation Notes
//!
//! The running effect is found through the runtime's active-effect stack,
//! which is maintained by a scope guard so that a panicking effect cannot
//! leave a stale entry behind.

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;
mod value;

pub use computed::Computed;
pub use effect::ReactiveEffect;
pub use proxy::Reactive;
pub use refs::Ref;
pub use runtime::Runtime;
pub use subscriber::EffectId;
pub use value::{Array, Event, Handler, Object, Value};

pub(crate) use subscriber::Subscriber;
