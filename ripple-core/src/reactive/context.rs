//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive slot is read, the
//! runtime registers the current effect as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of frames. Running an effect pushes a frame
//! for it; the frame is popped when the returned guard is dropped, including
//! during unwinding. Nested runs (a computed read inside a render) therefore
//! attribute reads to the innermost effect and restore the outer one
//! afterwards.
//!
//! A frame may also be empty: [`ReactiveContext::untracked`] suspends tracking
//! for its scope without disturbing the frames below it.

use std::sync::Arc;

use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};

/// One entry of the active-effect stack. `None` suspends tracking.
pub(crate) type Frame = Option<Arc<dyn Subscriber>>;

/// Guard that pops its frame when dropped.
pub(crate) struct ReactiveContext<'a> {
    runtime: &'a Runtime,
    effect: Option<EffectId>,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a tracking frame for the given subscriber.
    pub(crate) fn enter(runtime: &'a Runtime, subscriber: Arc<dyn Subscriber>) -> Self {
        let effect = Some(subscriber.id());
        runtime.push_frame(Some(subscriber));
        Self { runtime, effect }
    }

    /// Enter a frame in which reads are not tracked.
    pub(crate) fn untracked(runtime: &'a Runtime) -> Self {
        runtime.push_frame(None);
        Self {
            runtime,
            effect: None,
        }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let popped = self.runtime.pop_frame();

        // Frames are strictly nested; a mismatch is a bookkeeping bug.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.as_ref().map(|s| s.id()),
                self.effect,
                "ReactiveContext mismatch: expected {:?}",
                self.effect,
            );
        }
    }
}
