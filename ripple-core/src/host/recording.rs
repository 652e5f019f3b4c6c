//! In-memory recording adapter.
//!
//! [`RecordingHost`] keeps a small node tree in memory and appends every
//! adapter call to an operation log. Tests assert on the resulting tree
//! (`to_html`, `text_content`) or on the exact calls made (`take_ops`); a
//! remote surface can replay the log after [`RecordingHost::encode_ops`].

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{HostAdapter, HostNode};
use crate::error::Result;
use crate::reactive::{Event, Handler, Value};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, content: String },
    SetText { node: HostNode, content: String },
    Insert { parent: HostNode, node: HostNode, anchor: Option<HostNode> },
    Remove { node: HostNode },
    SetClass { el: HostNode, class: String },
    SetStyle { el: HostNode, name: String, value: Option<String> },
    SetAttribute { el: HostNode, name: String, value: String },
    RemoveAttribute { el: HostNode, name: String },
    AddListener { el: HostNode, event: String },
    RemoveListener { el: HostNode, event: String },
    SetProperty { el: HostNode, name: String, value: serde_json::Value },
}

impl HostOp {
    /// Whether the op creates a node.
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }
}

enum NodeKind {
    Container,
    Element(String),
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    class: String,
    style: IndexMap<String, String>,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    listeners: Vec<(String, Handler)>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            class: String::new(),
            style: IndexMap::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<HostNode, NodeData>,
    next_id: u64,
}

impl Tree {
    fn alloc(&mut self, kind: NodeKind) -> HostNode {
        self.next_id += 1;
        let node = HostNode::new(self.next_id);
        self.nodes.insert(node, NodeData::new(kind));
        node
    }

    fn detach(&mut self, node: HostNode) {
        let parent = self.nodes.get_mut(&node).and_then(|data| data.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != node);
        }
    }

    /// Detach `node` and forget it along with everything below it.
    fn free(&mut self, node: HostNode) {
        self.detach(node);
        let mut pending = vec![node];
        while let Some(next) = pending.pop() {
            if let Some(data) = self.nodes.remove(&next) {
                pending.extend(data.children);
            }
        }
    }

    fn text_content(&self, node: HostNode, out: &mut String) {
        let Some(data) = self.nodes.get(&node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(content) => out.push_str(content),
            NodeKind::Element(_) | NodeKind::Container => {
                for child in &data.children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn html(&self, node: HostNode, out: &mut String) {
        let Some(data) = self.nodes.get(&node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(content) => out.push_str(content),
            NodeKind::Container => {
                for child in &data.children {
                    self.html(*child, out);
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                if !data.class.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", data.class));
                }
                if !data.style.is_empty() {
                    let style: Vec<String> =
                        data.style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    out.push_str(&format!(" style=\"{}\"", style.join("; ")));
                }
                for (name, value) in &data.attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &data.children {
                    self.html(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    fn descendants(&self, node: HostNode) -> usize {
        self.nodes
            .get(&node)
            .map(|data| {
                data.children
                    .iter()
                    .map(|child| 1 + self.descendants(*child))
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// An adapter over an in-memory tree that logs every call.
#[derive(Default)]
pub struct RecordingHost {
    tree: Mutex<Tree>,
    ops: Mutex<Vec<HostOp>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached root to render into. Not logged.
    pub fn create_container(&self) -> HostNode {
        self.tree.lock().alloc(NodeKind::Container)
    }

    fn record(&self, op: HostOp) {
        self.ops.lock().push(op);
    }

    /// Markup for `node` and its subtree. Containers render their children
    /// only.
    pub fn to_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.tree.lock().html(node, &mut out);
        out
    }

    /// Concatenated text of every text node below `node`.
    pub fn text_content(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.tree.lock().text_content(node, &mut out);
        out
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.tree.lock().nodes.get(&node).and_then(|data| data.parent)
    }

    /// Number of nodes the host currently holds, containers included.
    pub fn node_count(&self) -> usize {
        self.tree.lock().nodes.len()
    }

    /// Number of nodes attached below `node`, at any depth.
    pub fn descendant_count(&self, node: HostNode) -> usize {
        self.tree.lock().descendants(node)
    }

    pub fn tag(&self, node: HostNode) -> Option<String> {
        match &self.tree.lock().nodes.get(&node)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, el: HostNode, name: &str) -> Option<String> {
        self.tree.lock().nodes.get(&el)?.attributes.get(name).cloned()
    }

    pub fn property(&self, el: HostNode, name: &str) -> Option<Value> {
        self.tree.lock().nodes.get(&el)?.properties.get(name).cloned()
    }

    pub fn class(&self, el: HostNode) -> String {
        self.tree
            .lock()
            .nodes
            .get(&el)
            .map(|data| data.class.clone())
            .unwrap_or_default()
    }

    pub fn style(&self, el: HostNode, name: &str) -> Option<String> {
        self.tree.lock().nodes.get(&el)?.style.get(name).cloned()
    }

    pub fn listener_count(&self, el: HostNode, event: &str) -> usize {
        self.tree
            .lock()
            .nodes
            .get(&el)
            .map(|data| data.listeners.iter().filter(|(name, _)| name == event).count())
            .unwrap_or(0)
    }

    /// Invoke every listener for `event.name` on `el`. Returns how many ran.
    pub fn dispatch(&self, el: HostNode, event: &Event) -> usize {
        let handlers: Vec<Handler> = self
            .tree
            .lock()
            .nodes
            .get(&el)
            .map(|data| {
                data.listeners
                    .iter()
                    .filter(|(name, _)| *name == event.name)
                    .map(|(_, handler)| handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        for handler in &handlers {
            handler.call(event);
        }
        handlers.len()
    }

    /// Snapshot of the operation log.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.lock().clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.lock())
    }

    /// The operation log as MessagePack.
    pub fn encode_ops(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&*self.ops.lock())?)
    }

    /// Decode a log produced by [`encode_ops`](Self::encode_ops).
    pub fn decode_ops(bytes: &[u8]) -> Result<Vec<HostOp>> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl HostAdapter for RecordingHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let node = self.tree.lock().alloc(NodeKind::Element(tag.to_string()));
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&self, content: &str) -> HostNode {
        let node = self.tree.lock().alloc(NodeKind::Text(content.to_string()));
        self.record(HostOp::CreateText {
            node,
            content: content.to_string(),
        });
        node
    }

    fn set_text(&self, node: HostNode, content: &str) {
        {
            let mut tree = self.tree.lock();
            let is_text = matches!(
                tree.nodes.get(&node).map(|data| &data.kind),
                Some(NodeKind::Text(_))
            );

            if is_text {
                if let Some(data) = tree.nodes.get_mut(&node) {
                    data.kind = NodeKind::Text(content.to_string());
                }
            } else {
                let children = tree
                    .nodes
                    .get(&node)
                    .map(|data| data.children.clone())
                    .unwrap_or_default();
                for child in children {
                    tree.free(child);
                }
                if !content.is_empty() {
                    let text = tree.alloc(NodeKind::Text(content.to_string()));
                    if let Some(data) = tree.nodes.get_mut(&text) {
                        data.parent = Some(node);
                    }
                    if let Some(data) = tree.nodes.get_mut(&node) {
                        data.children.push(text);
                    }
                }
            }
        }
        self.record(HostOp::SetText {
            node,
            content: content.to_string(),
        });
    }

    fn insert_before(&self, parent: HostNode, node: HostNode, anchor: Option<HostNode>) {
        {
            let mut tree = self.tree.lock();
            tree.detach(node);
            if let Some(data) = tree.nodes.get_mut(&node) {
                data.parent = Some(parent);
            }
            let known = tree.nodes.contains_key(&node);
            if let Some(data) = tree.nodes.get_mut(&parent).filter(|_| known) {
                let index = anchor
                    .and_then(|anchor| data.children.iter().position(|c| *c == anchor))
                    .unwrap_or(data.children.len());
                data.children.insert(index, node);
            }
        }
        self.record(HostOp::Insert {
            parent,
            node,
            anchor,
        });
    }

    /// Removed nodes are dropped from the tree; their handles go stale.
    fn remove(&self, node: HostNode) {
        self.tree.lock().free(node);
        self.record(HostOp::Remove { node });
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let tree = self.tree.lock();
        let parent = tree.nodes.get(&node)?.parent?;
        let siblings = &tree.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn set_class(&self, el: HostNode, class: &str) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            data.class = class.to_string();
        }
        self.record(HostOp::SetClass {
            el,
            class: class.to_string(),
        });
    }

    fn set_style(&self, el: HostNode, name: &str, value: Option<&str>) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            match value {
                Some(value) if !value.is_empty() => {
                    data.style.insert(name.to_string(), value.to_string());
                }
                _ => {
                    data.style.shift_remove(name);
                }
            }
        }
        self.record(HostOp::SetStyle {
            el,
            name: name.to_string(),
            value: value.map(str::to_string),
        });
    }

    fn set_attribute(&self, el: HostNode, name: &str, value: &str) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            data.attributes.insert(name.to_string(), value.to_string());
        }
        self.record(HostOp::SetAttribute {
            el,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&self, el: HostNode, name: &str) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            if name == "style" {
                data.style.clear();
            }
            data.attributes.shift_remove(name);
        }
        self.record(HostOp::RemoveAttribute {
            el,
            name: name.to_string(),
        });
    }

    fn add_listener(&self, el: HostNode, event: &str, handler: Handler) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            data.listeners.push((event.to_string(), handler));
        }
        self.record(HostOp::AddListener {
            el,
            event: event.to_string(),
        });
    }

    fn remove_listener(&self, el: HostNode, event: &str, handler: &Handler) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            data.listeners
                .retain(|(name, h)| !(name == event && h.ptr_eq(handler)));
        }
        self.record(HostOp::RemoveListener {
            el,
            event: event.to_string(),
        });
    }

    fn is_boolean_property(&self, el: HostNode, name: &str) -> bool {
        let current = self
            .tree
            .lock()
            .nodes
            .get(&el)
            .and_then(|data| data.properties.get(name).cloned());
        match current {
            Some(value) => value.as_bool().is_some(),
            None => matches!(name, "checked" | "selected" | "muted" | "disabled"),
        }
    }

    fn set_property(&self, el: HostNode, name: &str, value: &Value) {
        if let Some(data) = self.tree.lock().nodes.get_mut(&el) {
            data.properties.insert(name.to_string(), value.clone());
        }
        self.record(HostOp::SetProperty {
            el,
            name: name.to_string(),
            value: to_json(value),
        });
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Array(array) => serde_json::Value::Array(array.to_vec().iter().map(to_json).collect()),
        Value::Object(object) => serde_json::Value::Object(
            object
                .entries()
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        Value::Reactive(proxy) => to_json(&proxy.to_raw()),
        Value::Ref(r) => to_json(&r.get_untracked()),
        Value::Computed(_) | Value::Handler(_) => {
            serde_json::Value::String(value.to_display_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn builds_and_prints_a_tree() {
        let host = RecordingHost::new();
        let root = host.create_container();
        let ul = host.create_element("ul");
        let a = host.create_element("li");
        let b = host.create_element("li");
        host.set_text(a, "a");
        host.set_text(b, "b");
        host.insert_before(ul, b, None);
        host.insert_before(ul, a, Some(b));
        host.insert_before(root, ul, None);
        host.set_class(ul, "list");

        assert_eq!(host.to_html(root), r#"<ul class="list"><li>a</li><li>b</li></ul>"#);
        assert_eq!(host.text_content(root), "ab");
        assert_eq!(host.next_sibling(a), Some(b));
        assert_eq!(host.next_sibling(b), None);
    }

    #[test]
    fn insert_moves_attached_nodes() {
        let host = RecordingHost::new();
        let root = host.create_container();
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert_before(root, a, None);
        host.insert_before(root, b, None);

        host.insert_before(root, b, Some(a));
        assert_eq!(host.children(root), vec![b, a]);

        host.remove(b);
        assert_eq!(host.children(root), vec![a]);
        assert_eq!(host.parent(b), None);
    }

    #[test]
    fn removed_subtrees_are_freed() {
        let host = RecordingHost::new();
        let root = host.create_container();
        let ul = host.create_element("ul");
        let li = host.create_element("li");
        host.set_text(li, "a");
        host.insert_before(ul, li, None);
        host.insert_before(root, ul, None);
        assert_eq!(host.node_count(), 4);

        host.set_text(li, "b");
        assert_eq!(host.node_count(), 4);

        host.remove(ul);
        assert_eq!(host.node_count(), 1);
        assert_eq!(host.to_html(root), "");

        host.insert_before(root, li, None);
        assert!(host.children(root).is_empty());
    }

    #[test]
    fn dispatch_invokes_matching_listeners() {
        let host = RecordingHost::new();
        let button = host.create_element("button");
        let clicks = Arc::new(AtomicI32::new(0));

        let clicks_clone = clicks.clone();
        host.add_listener(
            button,
            "click",
            Handler::new(move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(host.dispatch(button, &Event::new("click")), 1);
        assert_eq!(host.dispatch(button, &Event::new("input")), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ops_survive_a_msgpack_round_trip() {
        let host = RecordingHost::new();
        let root = host.create_container();
        let input = host.create_element("input");
        host.set_property(input, "value", &Value::from("hi"));
        host.insert_before(root, input, None);

        let bytes = host.encode_ops().unwrap();
        let decoded = RecordingHost::decode_ops(&bytes).unwrap();
        assert_eq!(decoded, host.ops());
        assert_eq!(decoded.iter().filter(|op| op.is_create()).count(), 1);
    }
}
