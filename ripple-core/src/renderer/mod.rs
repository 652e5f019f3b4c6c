//! Reconciler
//!
//! The [`Renderer`] turns abstract trees into host mutations. Each call to
//! [`Renderer::patch`] compares a new node with the node that previously
//! occupied the same position and issues the smallest set of adapter calls
//! that makes the host match the new node.
//!
//! # How It Works
//!
//! 1. A node whose type differs from its predecessor replaces it: the old
//!    node is unmounted and the new one mounted where the old one stood.
//! 2. Elements reuse their host node, diff props, then diff children.
//! 3. Text nodes update their content in place.
//! 4. Fragments sit between two empty text markers, so a variable number of
//!    children keeps a stable position among its siblings.
//! 5. Components mount an instance, or on update hand the new props to the
//!    existing instance and re-render it synchronously.
//!
//! Child lists are diffed positionally unless they are keyed, in which case
//! the keyed algorithm in [`keyed`] moves as few nodes as possible.

mod keyed;

pub use keyed::longest_increasing_subsequence;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace};

use crate::app::{ComponentRegistry, TemplateCompiler};
use crate::component::{Component, ComponentInstance, RenderFn};
use crate::config::KeyedDetection;
use crate::host::{patch_props, HostAdapter, HostNode};
use crate::reactive::Runtime;
use crate::vnode::{ChildKind, Children, VNode, VNodeKind, VNodeType};

struct RendererInner {
    runtime: Runtime,
    host: Arc<dyn HostAdapter>,
    /// Last tree rendered into each container.
    roots: Mutex<HashMap<HostNode, VNode>>,
    registry: ComponentRegistry,
    compiler: RwLock<Option<Arc<dyn TemplateCompiler>>>,
}

/// Drives a [`HostAdapter`] from abstract trees. Clones share state.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<RendererInner>,
}

impl Renderer {
    pub fn new(runtime: &Runtime, host: Arc<dyn HostAdapter>) -> Self {
        Self {
            inner: Arc::new(RendererInner {
                runtime: runtime.clone(),
                host,
                roots: Mutex::new(HashMap::new()),
                registry: ComponentRegistry::new(),
                compiler: RwLock::new(None),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn host(&self) -> &dyn HostAdapter {
        self.inner.host.as_ref()
    }

    /// Components resolvable by name from render functions.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn set_compiler(&self, compiler: Arc<dyn TemplateCompiler>) {
        *self.inner.compiler.write() = Some(compiler);
    }

    pub fn compiler(&self) -> Option<Arc<dyn TemplateCompiler>> {
        self.inner.compiler.read().clone()
    }

    /// Render `vnode` into `container`, patching against whatever was
    /// rendered there before. `None` unmounts the previous tree.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) {
        let prev = self.inner.roots.lock().remove(&container);

        match (prev, vnode) {
            (Some(mut prev), None) => {
                debug!(container = container.raw(), "unmounting root");
                self.unmount(&mut prev, true);
            }
            (mut prev, Some(mut next)) => {
                debug!(
                    container = container.raw(),
                    initial = prev.is_none(),
                    "rendering root"
                );
                self.patch(prev.as_mut(), &mut next, container, None);
                self.inner.roots.lock().insert(container, next);
            }
            (None, None) => {}
        }
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: HostNode) -> Option<VNode> {
        self.inner.roots.lock().get(&container).cloned()
    }

    /// Bring the host in line with `next`, given the node `prev` that
    /// occupied the same position. `anchor` is where a freshly mounted node
    /// is inserted; `None` appends.
    pub fn patch(
        &self,
        prev: Option<&mut VNode>,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let mut anchor = anchor;
        let prev = match prev {
            Some(prev) if !prev.ty.is_same(&next.ty) => {
                trace!(from = ?prev.ty, to = ?next.ty, "replacing node");
                if let Some(last) = self.last_host_node(prev) {
                    anchor = self.host().next_sibling(last);
                }
                self.unmount(prev, true);
                None
            }
            prev => prev,
        };

        match next.kind() {
            VNodeKind::Element => self.process_element(prev, next, container, anchor),
            VNodeKind::Text => self.process_text(prev, next, container, anchor),
            VNodeKind::Fragment => self.process_fragment(prev, next, container, anchor),
            VNodeKind::Component => self.process_component(prev, next, container, anchor),
        }
    }

    // ------------------------------------------------------------------------
    // Node kinds
    // ------------------------------------------------------------------------

    fn process_element(
        &self,
        prev: Option<&mut VNode>,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let Some(prev) = prev.filter(|prev| prev.el.is_some()) else {
            self.mount_element(next, container, anchor);
            return;
        };
        let Some(el) = prev.el else {
            return;
        };

        next.el = Some(el);
        patch_props(self.host(), el, prev.props.as_ref(), next.props.as_ref());
        self.patch_children(prev, next, el, None);
    }

    fn mount_element(&self, vnode: &mut VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeType::Element(tag) = &vnode.ty else {
            return;
        };
        let el = self.host().create_element(tag);
        trace!(tag = %tag, el = el.raw(), "mount element");

        match &mut vnode.children {
            Children::Text(content) => self.host().set_text(el, content),
            Children::Nodes(children) => self.mount_children(children, el, None),
            Children::None => {}
        }
        if vnode.props.is_some() {
            patch_props(self.host(), el, None, vnode.props.as_ref());
        }

        self.host().insert_before(container, el, anchor);
        vnode.el = Some(el);
    }

    fn process_text(
        &self,
        prev: Option<&mut VNode>,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let content = next.children.as_text().unwrap_or_default();

        match prev.and_then(|prev| prev.el.zip(prev.children.as_text())) {
            Some((el, old)) => {
                next.el = Some(el);
                if old != content {
                    self.host().set_text(el, content);
                }
            }
            None => {
                let el = self.host().create_text(content);
                self.host().insert_before(container, el, anchor);
                next.el = Some(el);
            }
        }
    }

    fn process_fragment(
        &self,
        prev: Option<&mut VNode>,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        if let Some(prev) = prev {
            if let (Some(start), Some(end)) = (prev.el, prev.anchor) {
                next.el = Some(start);
                next.anchor = Some(end);
                self.patch_children(prev, next, container, Some(end));
                return;
            }
        }

        let start = self.host().create_text("");
        let end = self.host().create_text("");
        self.host().insert_before(container, start, anchor);
        self.host().insert_before(container, end, anchor);
        next.el = Some(start);
        next.anchor = Some(end);

        if let Children::Nodes(children) = &mut next.children {
            self.mount_children(children, container, Some(end));
        }
    }

    fn process_component(
        &self,
        prev: Option<&mut VNode>,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let VNodeType::Component(def) = &next.ty else {
            return;
        };

        match prev.and_then(|prev| prev.component.clone()) {
            Some(instance) => {
                trace!(component = instance.name(), "passive update");
                instance.set_next(next.props.clone());
                instance.update();
                next.el = instance.first_host_node();
                next.component = Some(instance);
            }
            None => {
                let instance = ComponentInstance::mount(self, def.clone(), next.props.as_ref(), container, anchor);
                next.el = instance.first_host_node();
                next.component = Some(instance);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    fn mount_children(&self, children: &mut [VNode], container: HostNode, anchor: Option<HostNode>) {
        for child in children {
            self.patch(None, child, container, anchor);
        }
    }

    fn patch_children(
        &self,
        prev: &mut VNode,
        next: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match (&mut prev.children, &mut next.children) {
            (old, Children::Text(content)) => {
                if let Children::Nodes(nodes) = &mut *old {
                    self.unmount_children(nodes);
                }
                if old.as_text() != Some(content.as_str()) {
                    self.host().set_text(container, content);
                }
            }
            (Children::Nodes(old), Children::Nodes(new)) => {
                if self.is_keyed(old, new) {
                    self.patch_keyed_children(old, new, container, anchor);
                } else {
                    self.patch_unkeyed_children(old, new, container, anchor);
                }
            }
            (old, Children::Nodes(new)) => {
                if old.kind() == ChildKind::Text {
                    self.host().set_text(container, "");
                }
                self.mount_children(new, container, anchor);
            }
            (old, Children::None) => match old {
                Children::Nodes(old) => self.unmount_children(old),
                Children::Text(_) => self.host().set_text(container, ""),
                Children::None => {}
            },
        }
    }

    fn is_keyed(&self, old: &[VNode], new: &[VNode]) -> bool {
        match self.runtime().config().renderer.keyed_detection {
            KeyedDetection::FirstChild => {
                let first_keyed = |nodes: &[VNode]| nodes.first().is_some_and(|n| n.key.is_some());
                first_keyed(old) && first_keyed(new)
            }
            KeyedDetection::AllChildren => {
                let all_keyed =
                    |nodes: &[VNode]| !nodes.is_empty() && nodes.iter().all(|n| n.key.is_some());
                all_keyed(old) && all_keyed(new)
            }
        }
    }

    fn patch_unkeyed_children(
        &self,
        old: &mut [VNode],
        new: &mut [VNode],
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let common = old.len().min(new.len());
        for (prev, next) in old.iter_mut().zip(new.iter_mut()) {
            self.patch(Some(prev), next, container, anchor);
        }

        if old.len() > common {
            self.unmount_children(&mut old[common..]);
        } else {
            self.mount_children(&mut new[common..], container, anchor);
        }
    }

    fn unmount_children(&self, children: &mut [VNode]) {
        for child in children {
            self.unmount(child, true);
        }
    }

    // ------------------------------------------------------------------------
    // Unmounting and moving
    // ------------------------------------------------------------------------

    /// Release everything `vnode` owns. With `remove` unset, host nodes are
    /// left attached; used below an element that is itself being removed.
    pub fn unmount(&self, vnode: &mut VNode, remove: bool) {
        match vnode.kind() {
            VNodeKind::Component => {
                if let Some(instance) = vnode.component.clone() {
                    instance.unmount(remove);
                }
            }
            VNodeKind::Element => {
                if let Children::Nodes(children) = &mut vnode.children {
                    for child in children {
                        self.unmount(child, false);
                    }
                }
                if remove {
                    if let Some(el) = vnode.el {
                        trace!(el = el.raw(), "unmount element");
                        self.host().remove(el);
                    }
                }
            }
            VNodeKind::Text => {
                if let Some(el) = vnode.el.filter(|_| remove) {
                    self.host().remove(el);
                }
            }
            VNodeKind::Fragment => {
                if let Children::Nodes(children) = &mut vnode.children {
                    for child in children {
                        self.unmount(child, remove);
                    }
                }
                if remove {
                    for marker in [vnode.el, vnode.anchor].into_iter().flatten() {
                        self.host().remove(marker);
                    }
                }
            }
        }
    }

    /// Re-insert every host node of `vnode` before `anchor`.
    pub(crate) fn move_vnode(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match vnode.kind() {
            VNodeKind::Element | VNodeKind::Text => {
                if let Some(el) = vnode.el {
                    self.host().insert_before(container, el, anchor);
                }
            }
            VNodeKind::Fragment => {
                if let Some(start) = vnode.el {
                    self.host().insert_before(container, start, anchor);
                }
                for child in vnode.children.as_nodes() {
                    self.move_vnode(child, container, anchor);
                }
                if let Some(end) = vnode.anchor {
                    self.host().insert_before(container, end, anchor);
                }
            }
            VNodeKind::Component => {
                if let Some(instance) = &vnode.component {
                    instance.with_subtree(|subtree| self.move_vnode(subtree, container, anchor));
                }
            }
        }
    }

    /// The first host node `vnode` occupies, in document order.
    pub fn first_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match &vnode.component {
            Some(instance) => instance.first_host_node().or(vnode.el),
            None => vnode.el,
        }
    }

    /// The last host node `vnode` occupies, in document order.
    pub fn last_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.kind() {
            VNodeKind::Fragment => vnode.anchor,
            VNodeKind::Component => vnode
                .component
                .as_ref()
                .and_then(|instance| instance.last_host_node())
                .or(vnode.el),
            VNodeKind::Element | VNodeKind::Text => vnode.el,
        }
    }

    /// The render function for `def`, compiling its template on first use.
    ///
    /// # Panics
    ///
    /// Panics when `def` has no render function and its template cannot be
    /// compiled. [`App`](crate::app::App) rejects such components before they
    /// are mounted.
    pub(crate) fn ensure_render(&self, def: &Component) -> RenderFn {
        if let Some(render) = def.render_fn() {
            return render;
        }

        let name = def.name().unwrap_or("anonymous");
        let Some(compiler) = self.compiler() else {
            error!(component = name, "no render function and no template compiler");
            panic!("component `{name}` has no render function and no template compiler is registered");
        };

        match def.compile_with(compiler.as_ref()) {
            Ok(render) => render,
            Err(err) => {
                error!(component = name, error = %err, "template compilation failed");
                panic!("{err}");
            }
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("roots", &self.inner.roots.lock().len())
            .field("components", &self.inner.registry.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, RecordingHost};
    use crate::vnode::{fragment, h, text, Props};

    fn setup() -> (Arc<RecordingHost>, Renderer, HostNode) {
        let host = Arc::new(RecordingHost::new());
        let renderer = Renderer::new(&Runtime::new(), host.clone());
        let container = host.create_container();
        (host, renderer, container)
    }

    #[test]
    fn mounts_element_with_props_and_text() {
        let (host, renderer, root) = setup();

        renderer.render(Some(h("p", Props::new().with("id", "x"), "hi")), root);

        assert_eq!(host.to_html(root), r#"<p id="x">hi</p>"#);
    }

    #[test]
    fn element_is_reused_across_renders() {
        let (host, renderer, root) = setup();

        renderer.render(Some(h("p", None, "a")), root);
        let el = renderer.root(root).and_then(|v| v.el());
        host.take_ops();

        renderer.render(Some(h("p", None, "b")), root);
        assert_eq!(renderer.root(root).and_then(|v| v.el()), el);
        assert_eq!(host.to_html(root), "<p>b</p>");
        assert!(!host.take_ops().iter().any(HostOp::is_create));
    }

    #[test]
    fn replacing_a_type_keeps_the_position() {
        let (host, renderer, root) = setup();

        renderer.render(
            Some(h("div", None, vec![h("a", None, ()), h("b", None, ()), h("c", None, ())])),
            root,
        );
        renderer.render(
            Some(h("div", None, vec![h("a", None, ()), h("i", None, ()), h("c", None, ())])),
            root,
        );

        assert_eq!(host.to_html(root), "<div><a></a><i></i><c></c></div>");
    }

    #[test]
    fn fragment_children_stay_between_markers() {
        let (host, renderer, root) = setup();

        let tree = |items: &[&str]| {
            h(
                "div",
                None,
                vec![
                    h("header", None, ()),
                    fragment(items.iter().map(|s| text(*s)).collect()),
                    h("footer", None, ()),
                ],
            )
        };

        renderer.render(Some(tree(&["a"])), root);
        renderer.render(Some(tree(&["a", "b", "c"])), root);
        assert_eq!(host.to_html(root), "<div><header></header>abc<footer></footer></div>");

        renderer.render(Some(tree(&[])), root);
        assert_eq!(host.to_html(root), "<div><header></header><footer></footer></div>");
    }

    #[test]
    fn switching_between_text_and_list_children() {
        let (host, renderer, root) = setup();

        renderer.render(Some(h("ul", None, "empty")), root);
        renderer.render(Some(h("ul", None, vec![h("li", None, "1")])), root);
        assert_eq!(host.to_html(root), "<ul><li>1</li></ul>");

        renderer.render(Some(h("ul", None, "empty")), root);
        assert_eq!(host.to_html(root), "<ul>empty</ul>");

        renderer.render(Some(h("ul", None, ())), root);
        assert_eq!(host.to_html(root), "<ul></ul>");
    }

    #[test]
    fn render_none_unmounts() {
        let (host, renderer, root) = setup();

        renderer.render(Some(fragment(vec![h("a", None, ()), text("b")])), root);
        assert!(host.descendant_count(root) > 0);

        renderer.render(None, root);
        assert_eq!(host.descendant_count(root), 0);
        assert!(renderer.root(root).is_none());
    }

    #[test]
    fn replacing_an_unmounted_node_uses_the_given_anchor() {
        let (host, renderer, root) = setup();
        let aside = host.create_element("aside");
        host.insert_before(root, aside, None);

        let mut stale = text("never mounted");
        let mut next = h("b", None, ());
        renderer.patch(Some(&mut stale), &mut next, root, Some(aside));

        assert_eq!(host.to_html(root), "<b></b><aside></aside>");
    }

    #[test]
    fn unkeyed_lists_patch_by_position() {
        let (host, renderer, root) = setup();
        let list = |n: usize| h("ol", None, (0..n).map(|i| h("li", None, i)).collect::<Vec<_>>());

        renderer.render(Some(list(3)), root);
        renderer.render(Some(list(1)), root);
        assert_eq!(host.to_html(root), "<ol><li>0</li></ol>");

        renderer.render(Some(list(2)), root);
        assert_eq!(host.to_html(root), "<ol><li>0</li><li>1</li></ol>");
    }
}
