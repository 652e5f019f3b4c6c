//! Output Adapter
//!
//! The reconciler never touches a concrete display surface. It drives a
//! [`HostAdapter`], which owns the real nodes and hands out opaque
//! [`HostNode`] handles for them.
//!
//! [`RecordingHost`] is an in-memory adapter that logs every call; it backs
//! the test suite and can stream its log to a remote surface.

mod props;
mod recording;

pub use props::{patch_prop, patch_props, PropClass};
pub use recording::{HostOp, RecordingHost};

use serde::{Deserialize, Serialize};

use crate::reactive::{Handler, Value};

/// Opaque handle to a node owned by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostNode(u64);

impl HostNode {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Primitive operations the reconciler needs from a display surface.
pub trait HostAdapter: Send + Sync {
    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, content: &str) -> HostNode;

    /// Replace the text content of a node. On an element this replaces all
    /// of its children with a single text run.
    fn set_text(&self, node: HostNode, content: &str);

    /// Insert `node` into `parent` before `anchor`, or at the end when there
    /// is no anchor. Inserting a node that is already attached moves it.
    fn insert_before(&self, parent: HostNode, node: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&self, node: HostNode);

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    fn set_class(&self, el: HostNode, class: &str);

    /// Set one style property, or clear it with `None`.
    fn set_style(&self, el: HostNode, name: &str, value: Option<&str>);

    fn set_attribute(&self, el: HostNode, name: &str, value: &str);

    fn remove_attribute(&self, el: HostNode, name: &str);

    /// Register `handler` for the lower-cased event `event`.
    fn add_listener(&self, el: HostNode, event: &str, handler: Handler);

    fn remove_listener(&self, el: HostNode, event: &str, handler: &Handler);

    /// Whether the element's property `name` holds a boolean.
    fn is_boolean_property(&self, el: HostNode, name: &str) -> bool;

    fn set_property(&self, el: HostNode, name: &str, value: &Value);
}
