//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: plain
//! effects, computed getters and component render effects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph::{DepKey, TargetId};

/// Unique identifier for an effect.
///
/// Each effect gets a unique ID when created. The dependency graph and the
/// job queue both use it as the effect's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// The graph-facing side of an effect.
///
/// The dependency graph only needs three things from an effect: its identity,
/// a place to record which slots it was registered in, and a way to notify it.
pub(crate) trait Subscriber: Send + Sync {
    fn id(&self) -> EffectId;

    /// Remember that this subscriber was registered against (target, key).
    fn record_dep(&self, target: TargetId, key: DepKey);

    /// A slot this subscriber read has changed.
    fn notify(self: Arc<Self>);
}
