//! Abstract Output Tree
//!
//! A [`VNode`] describes one piece of UI for one render: an element, a text
//! leaf, a fragment (a keyless run of siblings) or a component. Render
//! functions build fresh trees with [`h`]; the reconciler compares the new
//! tree with the previous one and only mutates the nodes to record which
//! host nodes they ended up owning.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::{Component, ComponentInstance};
use crate::host::HostNode;
use crate::reactive::{Object, Reactive, Value};

/// What a node is.
#[derive(Clone)]
pub enum VNodeType {
    /// A host element with the given tag.
    Element(String),
    Text,
    Fragment,
    Component(Component),
}

impl VNodeType {
    pub fn kind(&self) -> VNodeKind {
        match self {
            VNodeType::Element(_) => VNodeKind::Element,
            VNodeType::Text => VNodeKind::Text,
            VNodeType::Fragment => VNodeKind::Fragment,
            VNodeType::Component(_) => VNodeKind::Component,
        }
    }

    /// Whether a node of type `other` can be patched in place of this one.
    pub fn is_same(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(tag.to_string())
    }
}

impl From<String> for VNodeType {
    fn from(tag: String) -> Self {
        VNodeType::Element(tag)
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag:?})"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(c) => write!(f, "Component({:?})", c.name().unwrap_or("anonymous")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VNodeKind {
    Element,
    Text,
    Fragment,
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    None,
    Text,
    Nodes,
}

/// Children of a node.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    /// A single text child, set as the element's text content.
    Text(String),
    Nodes(Vec<VNode>),
}

impl Children {
    pub fn kind(&self) -> ChildKind {
        match self {
            Children::None => ChildKind::None,
            Children::Text(_) => ChildKind::Text,
            Children::Nodes(_) => ChildKind::Nodes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> &[VNode] {
        match self {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(nodes)
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children::Nodes(vec![node])
    }
}

/// Primitives become text; null means no children.
impl From<Value> for Children {
    fn from(value: Value) -> Self {
        match value.unwrap_ref() {
            Value::Null => Children::None,
            other => Children::Text(other.to_display_string()),
        }
    }
}

impl<T: Into<Children>> From<Option<T>> for Children {
    fn from(children: Option<T>) -> Self {
        children.map(Into::into).unwrap_or_default()
    }
}

macro_rules! impl_children_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Children {
            fn from(n: $t) -> Self {
                Children::from(Value::from(n))
            }
        })*
    };
}

impl_children_from_number!(i32, i64, u32, u64, usize, f64);

/// Key used by the keyed children diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VKey {
    Int(i64),
    Str(String),
}

/// 2^53 - 1: larger integral floats are not all distinct integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl VKey {
    /// Null means "no key". Integral numbers within the exactly representable
    /// range key as integers; other numbers key by their text.
    pub fn from_value(value: &Value) -> Option<VKey> {
        match value {
            Value::Null => None,
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Some(VKey::Int(*n as i64))
            }
            Value::Str(s) => Some(VKey::Str(s.clone())),
            other => Some(VKey::Str(other.to_display_string())),
        }
    }
}

impl From<i64> for VKey {
    fn from(n: i64) -> Self {
        VKey::Int(n)
    }
}

impl From<&str> for VKey {
    fn from(s: &str) -> Self {
        VKey::Str(s.to_string())
    }
}

/// Props of a node, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Props(IndexMap<String, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Props(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<IndexMap<String, Value>> for Props {
    fn from(map: IndexMap<String, Value>) -> Self {
        Props(map)
    }
}

impl From<&Object> for Props {
    fn from(object: &Object) -> Self {
        object.entries().into_iter().collect()
    }
}

/// Copies the proxy's current entries, untracked.
impl From<&Reactive> for Props {
    fn from(reactive: &Reactive) -> Self {
        reactive.raw_entries().into_iter().collect()
    }
}

/// A node of the abstract output tree.
#[derive(Clone)]
pub struct VNode {
    pub(crate) ty: VNodeType,
    pub(crate) props: Option<Props>,
    pub(crate) children: Children,
    pub(crate) key: Option<VKey>,
    /// Host node once mounted. Fragments: the start marker.
    pub(crate) el: Option<HostNode>,
    /// Fragments only: the end marker.
    pub(crate) anchor: Option<HostNode>,
    pub(crate) component: Option<Arc<ComponentInstance>>,
}

impl VNode {
    pub fn ty(&self) -> &VNodeType {
        &self.ty
    }

    pub fn kind(&self) -> VNodeKind {
        self.ty.kind()
    }

    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub fn child_kind(&self) -> ChildKind {
        self.children.kind()
    }

    pub fn key(&self) -> Option<&VKey> {
        self.key.as_ref()
    }

    /// The host node this vnode starts at. For a component, the first host
    /// node of its current subtree, which follows its own re-renders.
    pub fn el(&self) -> Option<HostNode> {
        match &self.component {
            Some(instance) => instance.first_host_node().or(self.el),
            None => self.el,
        }
    }

    pub fn anchor(&self) -> Option<HostNode> {
        self.anchor
    }

    pub fn component(&self) -> Option<&Arc<ComponentInstance>> {
        self.component.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.el.is_some() || self.component.is_some()
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("ty", &self.ty);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if let Some(props) = &self.props {
            s.field("props", props);
        }
        s.field("children", &self.children);
        if let Some(el) = &self.el {
            s.field("el", el);
        }
        s.finish()
    }
}

/// Build a node.
///
/// Reactive `style` values are copied so the node does not alias live
/// state, and `key` is lifted out of the props. Text children of a fragment
/// become a single text node.
///
/// # Example
///
/// ```
/// use ripple_core::vnode::{h, Props, VNodeKind};
///
/// let node = h("li", Props::new().with("key", 1), "first");
/// assert_eq!(node.kind(), VNodeKind::Element);
/// assert!(node.key().is_some());
/// ```
pub fn h(
    ty: impl Into<VNodeType>,
    props: impl Into<Option<Props>>,
    children: impl Into<Children>,
) -> VNode {
    let ty = ty.into();
    let mut props = props.into();
    let mut children = children.into();

    if let Some(props) = props.as_mut() {
        let reactive_style = props.get("style").and_then(Value::as_reactive).cloned();
        if let Some(style) = reactive_style {
            props.insert("style", style.snapshot());
        }
    }

    if matches!(ty, VNodeType::Fragment) {
        if let Children::Text(content) = children {
            children = Children::Nodes(vec![text(content)]);
        }
    }

    let key = props
        .as_ref()
        .and_then(|p| p.get("key"))
        .and_then(VKey::from_value);

    VNode {
        ty,
        props,
        children,
        key,
        el: None,
        anchor: None,
        component: None,
    }
}

/// A text leaf.
pub fn text(content: impl Into<String>) -> VNode {
    h(VNodeType::Text, None, Children::Text(content.into()))
}

/// A fragment around `children`.
pub fn fragment(children: Vec<VNode>) -> VNode {
    h(VNodeType::Fragment, None, children)
}

/// What a render function may return.
#[derive(Debug, Clone)]
pub enum RenderOutput {
    Node(VNode),
    Nodes(Vec<VNode>),
    Value(Value),
}

impl From<VNode> for RenderOutput {
    fn from(node: VNode) -> Self {
        RenderOutput::Node(node)
    }
}

impl From<Vec<VNode>> for RenderOutput {
    fn from(nodes: Vec<VNode>) -> Self {
        RenderOutput::Nodes(nodes)
    }
}

impl From<Value> for RenderOutput {
    fn from(value: Value) -> Self {
        RenderOutput::Value(value)
    }
}

impl From<&str> for RenderOutput {
    fn from(s: &str) -> Self {
        RenderOutput::Value(Value::from(s))
    }
}

impl From<String> for RenderOutput {
    fn from(s: String) -> Self {
        RenderOutput::Value(Value::from(s))
    }
}

/// Turn a render result into a single root node.
///
/// Lists become fragments and primitives become text. Null renders as empty
/// text.
pub fn normalize_vnode(output: impl Into<RenderOutput>) -> VNode {
    match output.into() {
        RenderOutput::Node(node) => node,
        RenderOutput::Nodes(nodes) => fragment(nodes),
        RenderOutput::Value(value) => match value.unwrap_ref() {
            Value::Null => text(""),
            other => text(other.to_display_string()),
        },
    }
}
