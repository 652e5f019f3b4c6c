//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (reactive containers, refs, computeds, effects)
//! - A batched update scheduler with `next_tick`
//! - An abstract output tree and a keyed reconciler
//! - Component instances driven by render effects
//!
//! The reconciler writes to any display surface through the [`HostAdapter`]
//! trait. [`RecordingHost`] is an in-memory implementation.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives and the runtime that owns them
//! - `graph`: Dependency graph from (target, key) to subscribed effects
//! - `scheduler`: Job queue, microtask queue and `next_tick`
//! - `vnode`: Abstract output tree and `h`
//! - `renderer`: Patch algorithm, including the keyed children diff
//! - `component`: Component definitions and mounted instances
//! - `host`: Output adapter trait, prop patching and the recording host
//! - `app`: Application boundary, component registry and template compiler
//! - `helpers`: `render_list`, `with_model` and name helpers
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Runtime, Value};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let runtime = Runtime::new();
//!
//! // Create a ref
//! let count = runtime.create_ref(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = runtime.computed(move || c.get().as_f64().unwrap_or(0.0) * 2.0);
//!
//! // Create an effect
//! let runs = Arc::new(AtomicI32::new(0));
//! let (r, d) = (runs.clone(), doubled.clone());
//! let _effect = runtime.effect(move || {
//!     d.get();
//!     r.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // Update the ref: the effect re-runs synchronously
//! count.set(5);
//! assert_eq!(doubled.get(), Value::from(10));
//! assert_eq!(runs.load(Ordering::SeqCst), 2);
//! ```

pub mod app;
pub mod component;
pub mod config;
pub mod error;
pub mod graph;
pub mod helpers;
pub mod host;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod vnode;

pub use app::App;
pub use component::{Component, ComponentInstance, RenderContext, SetupState};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use host::{HostAdapter, HostNode, RecordingHost};
pub use reactive::{Computed, Reactive, ReactiveEffect, Ref, Runtime, Value};
pub use renderer::Renderer;
pub use vnode::{fragment, h, normalize_vnode, text, VNode};
