//! Dependency Graph
//!
//! This module implements the mapping from reactive reads to the effects that
//! performed them.
//!
//! # Overview
//!
//! The graph has two levels:
//!
//! - target: a reactive container (raw object, raw array, ref, computed)
//! - key: a slot in that container (property, index, `length`, `value`)
//!
//! Each (target, key) pair owns a dependency set: the effects that read that
//! slot during their most recent tracked run. Sets keep insertion order so
//! notification order is deterministic.
//!
//! # Design Decisions
//!
//! 1. The graph stores weak references. An effect removes itself from every
//!    set it joined when it is stopped, before each run, and when its last
//!    handle drops. Notification skips entries whose effect is mid-drop.
//!
//! 2. The effect side keeps its own list of (target, key) pairs so that
//!    this cleanup is proportional to the effect's reads, not to the size of
//!    the graph.

mod target;

pub use target::{DepKey, TargetId};

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::reactive::{EffectId, Subscriber};

/// Effects registered against one (target, key) slot.
type Dep = IndexMap<EffectId, Weak<dyn Subscriber>>;

/// target -> key -> dependency set.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    targets: HashMap<TargetId, HashMap<DepKey, Dep>>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` against (target, key).
    ///
    /// Returns `true` if the subscriber was not already in the set.
    pub(crate) fn track(
        &mut self,
        target: TargetId,
        key: DepKey,
        subscriber: &Arc<dyn Subscriber>,
    ) -> bool {
        let dep = self
            .targets
            .entry(target)
            .or_default()
            .entry(key)
            .or_default();

        let id = subscriber.id();
        if dep.contains_key(&id) {
            return false;
        }
        dep.insert(id, Arc::downgrade(subscriber));
        true
    }

    /// Live subscribers of (target, key), in registration order.
    pub(crate) fn subscribers(&self, target: TargetId, key: &DepKey) -> Vec<Arc<dyn Subscriber>> {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map(|dep| dep.values().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Remove one subscriber from (target, key), pruning empty levels.
    pub(crate) fn untrack(&mut self, target: TargetId, key: &DepKey, id: EffectId) {
        let Some(keys) = self.targets.get_mut(&target) else {
            return;
        };
        if let Some(dep) = keys.get_mut(key) {
            dep.shift_remove(&id);
            if dep.is_empty() {
                keys.remove(key);
            }
        }
        if keys.is_empty() {
            self.targets.remove(&target);
        }
    }

    /// Number of live subscribers for (target, key).
    pub(crate) fn dependent_count(&self, target: TargetId, key: &DepKey) -> usize {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map(|dep| dep.values().filter(|weak| weak.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Number of targets with at least one dependency set.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MockSubscriber {
        id: EffectId,
        notified: Mutex<usize>,
    }

    impl MockSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: EffectId::new(),
                notified: Mutex::new(0),
            })
        }
    }

    impl Subscriber for MockSubscriber {
        fn id(&self) -> EffectId {
            self.id
        }

        fn record_dep(&self, _target: TargetId, _key: DepKey) {}

        fn notify(self: Arc<Self>) {
            *self.notified.lock() += 1;
        }
    }

    #[test]
    fn track_registers_once_per_slot() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let sub: Arc<dyn Subscriber> = MockSubscriber::new();

        assert!(graph.track(target, DepKey::from("a"), &sub));
        assert!(!graph.track(target, DepKey::from("a"), &sub));
        assert!(graph.track(target, DepKey::from("b"), &sub));

        assert_eq!(graph.dependent_count(target, &DepKey::from("a")), 1);
        assert_eq!(graph.subscribers(target, &DepKey::from("b")).len(), 1);
        assert!(graph.subscribers(target, &DepKey::from("c")).is_empty());
    }

    #[test]
    fn untrack_prunes_empty_levels() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let sub: Arc<dyn Subscriber> = MockSubscriber::new();

        graph.track(target, DepKey::Length, &sub);
        assert_eq!(graph.target_count(), 1);

        graph.untrack(target, &DepKey::Length, sub.id());
        assert_eq!(graph.target_count(), 0);
        assert_eq!(graph.dependent_count(target, &DepKey::Length), 0);
    }

    #[test]
    fn dropped_subscribers_are_skipped() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let live: Arc<dyn Subscriber> = MockSubscriber::new();

        {
            let dead: Arc<dyn Subscriber> = MockSubscriber::new();
            graph.track(target, DepKey::Value, &dead);
        }
        graph.track(target, DepKey::Value, &live);

        let subs = graph.subscribers(target, &DepKey::Value);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id(), live.id());
        assert_eq!(graph.dependent_count(target, &DepKey::Value), 1);
    }

    #[test]
    fn subscribers_keep_registration_order() {
        let mut graph = DependencyGraph::new();
        let target = TargetId::new();
        let first = MockSubscriber::new();
        let second = MockSubscriber::new();
        let first_dyn: Arc<dyn Subscriber> = first.clone();
        let second_dyn: Arc<dyn Subscriber> = second.clone();

        graph.track(target, DepKey::Index(0), &second_dyn);
        graph.track(target, DepKey::Index(0), &first_dyn);

        let ids: Vec<_> = graph
            .subscribers(target, &DepKey::Index(0))
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);

        for sub in graph.subscribers(target, &DepKey::Index(0)) {
            sub.notify();
        }
        assert_eq!(*first.notified.lock(), 1);
        assert_eq!(*second.notified.lock(), 1);
    }
}
