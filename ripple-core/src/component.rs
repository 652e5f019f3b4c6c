//! Component Instances
//!
//! A [`Component`] is a definition: declared props, an optional setup
//! function, and a render function (or a template compiled into one). Every
//! time a component node is mounted the reconciler creates a
//! [`ComponentInstance`] that owns the reactive props, the setup state, the
//! last rendered subtree and the render effect.
//!
//! # Lifecycle
//!
//! ```text
//! mount ──▶ Mounted ──(state change: queued job)──▶ re-render ──▶ Mounted
//!              │  ╲──(parent patch: passive update)──▶ re-render
//!              ▼
//!          Unmounted
//! ```
//!
//! The render effect is scheduled through the update scheduler, so changes
//! to state it read re-render the component once per flush. Its first run is
//! synchronous, during mount. A parent that re-renders hands the new props
//! to the instance and re-runs the effect directly instead of queueing it.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::app::{resolve_in, TemplateCompiler};
use crate::config::FallthroughPrecedence;
use crate::error::{Result, RuntimeError};
use crate::host::HostNode;
use crate::reactive::{Object, Reactive, ReactiveEffect, Runtime, Value};
use crate::renderer::Renderer;
use crate::scheduler::{Job, JobId};
use crate::vnode::{normalize_vnode, Props, RenderOutput, VNode, VNodeKind};

/// A render function. Reads made through the context are tracked.
pub type RenderFn = Arc<dyn Fn(&RenderContext<'_>) -> RenderOutput + Send + Sync>;

/// Box a closure as a [`RenderFn`].
pub fn render_fn<F>(f: F) -> RenderFn
where
    F: Fn(&RenderContext<'_>) -> RenderOutput + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A setup function, run once per instance before the first render.
pub type SetupFn = Arc<dyn Fn(&SetupContext) -> SetupState + Send + Sync>;

struct ComponentDef {
    name: Option<String>,
    props: Vec<String>,
    setup: Option<SetupFn>,
    render: OnceLock<RenderFn>,
    template: Option<String>,
    components: IndexMap<String, Component>,
}

/// A component definition. Clones share identity; two component nodes are
/// the same type only if they point at the same definition.
#[derive(Clone)]
pub struct Component(Arc<ComponentDef>);

impl Component {
    pub fn builder() -> ComponentBuilder {
        ComponentBuilder::default()
    }

    /// A component that only renders.
    pub fn from_render<F, R>(render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> R + Send + Sync + 'static,
        R: Into<RenderOutput>,
    {
        Self::builder().render(render).build()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Names of the declared props.
    pub fn declared_props(&self) -> &[String] {
        &self.0.props
    }

    pub fn template(&self) -> Option<&str> {
        self.0.template.as_deref()
    }

    /// Locally registered child components.
    pub fn components(&self) -> &IndexMap<String, Component> {
        &self.0.components
    }

    pub fn render_fn(&self) -> Option<RenderFn> {
        self.0.render.get().cloned()
    }

    pub fn has_render(&self) -> bool {
        self.0.render.get().is_some()
    }

    /// Compile the template into the render function, unless one exists.
    pub fn compile_with(&self, compiler: &dyn TemplateCompiler) -> Result<RenderFn> {
        if let Some(render) = self.render_fn() {
            return Ok(render);
        }

        let component = self.name().unwrap_or("anonymous").to_string();
        let Some(template) = self.template() else {
            return Err(RuntimeError::MissingRender { component });
        };

        let compiled = compiler
            .compile(template)
            .map_err(|message| RuntimeError::Compile { component, message })?;
        Ok(self.0.render.get_or_init(|| compiled).clone())
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("props", &self.0.props)
            .field("has_render", &self.has_render())
            .finish()
    }
}

#[derive(Default)]
pub struct ComponentBuilder {
    name: Option<String>,
    props: Vec<String>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    template: Option<String>,
    components: IndexMap<String, Component>,
}

impl ComponentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare props. Anything else passed by the parent becomes an attr.
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.props.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&SetupContext) -> SetupState + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn render<F, R>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> R + Send + Sync + 'static,
        R: Into<RenderOutput>,
    {
        self.render = Some(render_fn(move |ctx| render(ctx).into()));
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn component(mut self, name: impl Into<String>, component: Component) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    pub fn build(self) -> Component {
        let render = OnceLock::new();
        if let Some(f) = self.render {
            let _ = render.set(f);
        }
        Component(Arc::new(ComponentDef {
            name: self.name,
            props: self.props,
            setup: self.setup,
            render,
            template: self.template,
            components: self.components,
        }))
    }
}

/// State returned by a setup function, exposed to the render context.
#[derive(Debug, Clone, Default)]
pub struct SetupState(IndexMap<String, Value>);

impl SetupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a setup function receives.
pub struct SetupContext {
    props: Reactive,
    attrs: Props,
    runtime: Runtime,
}

impl SetupContext {
    pub fn props(&self) -> &Reactive {
        &self.props
    }

    pub fn attrs(&self) -> &Props {
        &self.attrs
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

/// What a render function receives.
pub struct RenderContext<'a> {
    instance: &'a ComponentInstance,
    setup: &'a SetupState,
    attrs: &'a Props,
}

impl RenderContext<'_> {
    /// Look up `key` in setup state, then in the props. Setup state wins.
    /// Prop reads are tracked.
    pub fn get(&self, key: &str) -> Value {
        match self.setup.get(key) {
            Some(value) => value.clone(),
            None => self.instance.props.get(key),
        }
    }

    /// Like [`get`](Self::get), reading through refs and computeds.
    pub fn value(&self, key: &str) -> Value {
        self.get(key).unwrap_ref()
    }

    pub fn props(&self) -> &Reactive {
        &self.instance.props
    }

    pub fn attrs(&self) -> &Props {
        self.attrs
    }

    pub fn runtime(&self) -> &Runtime {
        self.instance.renderer.runtime()
    }

    /// Find a component by name: locally registered components first, then
    /// the app registry. Tolerates kebab-case and uncapitalized names.
    pub fn resolve_component(&self, name: &str) -> Option<Component> {
        resolve_in(self.instance.def.components(), name)
            .or_else(|| self.instance.renderer.registry().resolve(name))
    }

    /// Like [`resolve_component`](Self::resolve_component), failing with
    /// [`RuntimeError::UnknownComponent`].
    pub fn component(&self, name: &str) -> Result<Component> {
        self.resolve_component(name)
            .ok_or_else(|| RuntimeError::UnknownComponent(name.to_string()))
    }
}

struct InstanceState {
    attrs: Props,
    setup: SetupState,
    subtree: Option<VNode>,
    mounted: bool,
    unmounted: bool,
    /// Props handed over by a parent re-render, adopted on the next run.
    next: Option<Option<Props>>,
}

/// A mounted component.
pub struct ComponentInstance {
    def: Component,
    render: RenderFn,
    renderer: Renderer,
    container: HostNode,
    anchor: Option<HostNode>,
    props: Reactive,
    state: Mutex<InstanceState>,
    effect: OnceLock<ReactiveEffect>,
}

impl ComponentInstance {
    /// Create the instance and render it for the first time, synchronously.
    pub(crate) fn mount(
        renderer: &Renderer,
        def: Component,
        vnode_props: Option<&Props>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Arc<ComponentInstance> {
        let render = renderer.ensure_render(&def);
        let runtime = renderer.runtime().clone();

        let (declared, attrs) = split_props(&def, vnode_props);
        let props = runtime.reactive_object(&Object::from_map(declared));

        let setup = match &def.0.setup {
            Some(setup) => {
                let ctx = SetupContext {
                    props: props.clone(),
                    attrs: attrs.clone(),
                    runtime: runtime.clone(),
                };
                runtime.untracked(|| setup(&ctx))
            }
            None => SetupState::new(),
        };

        let instance = Arc::new(ComponentInstance {
            def,
            render,
            renderer: renderer.clone(),
            container,
            anchor,
            props,
            state: Mutex::new(InstanceState {
                attrs,
                setup,
                subtree: None,
                mounted: false,
                unmounted: false,
                next: None,
            }),
            effect: OnceLock::new(),
        });

        let weak = Arc::downgrade(&instance);
        let effect = ReactiveEffect::with_scheduler(
            runtime,
            move || {
                if let Some(instance) = weak.upgrade() {
                    instance.render_pass();
                }
            },
            |effect| effect.runtime().queue_job(Job::for_effect(effect)),
        );
        let _ = instance.effect.set(effect.clone());

        debug!(component = instance.name(), "mounting component");
        effect.run();
        instance
    }

    fn render_pass(&self) {
        let (setup, attrs, next, mounted) = {
            let mut state = self.state.lock();
            if state.unmounted {
                return;
            }
            (state.setup.clone(), state.attrs.clone(), state.next.take(), state.mounted)
        };

        let attrs = match next {
            Some(next) => self.adopt_props(next.as_ref()),
            None => attrs,
        };

        let ctx = RenderContext {
            instance: self,
            setup: &setup,
            attrs: &attrs,
        };
        let mut tree = normalize_vnode((self.render)(&ctx));
        self.fall_through(&mut tree, &attrs);

        let mut prev = self.state.lock().subtree.take();
        let anchor = if mounted { None } else { self.anchor };
        self.renderer.patch(prev.as_mut(), &mut tree, self.container, anchor);

        let mut state = self.state.lock();
        state.subtree = Some(tree);
        state.mounted = true;
    }

    /// Sync declared props in place and replace the attrs. Returns the new
    /// attrs.
    fn adopt_props(&self, next: Option<&Props>) -> Props {
        let (declared, attrs) = split_props(&self.def, next);
        for name in self.def.declared_props() {
            match declared.get(name) {
                Some(value) => self.props.set(name, value.clone()),
                None => {
                    self.props.remove(name);
                }
            }
        }
        self.state.lock().attrs = attrs.clone();
        attrs
    }

    fn fall_through(&self, tree: &mut VNode, attrs: &Props) {
        if attrs.is_empty() || !matches!(tree.kind(), VNodeKind::Element | VNodeKind::Component) {
            return;
        }

        let precedence = self.renderer.runtime().config().renderer.fallthrough;
        let props = tree.props.get_or_insert_with(Props::new);
        for (key, value) in attrs.iter() {
            let keep_root = precedence == FallthroughPrecedence::RootWins && props.contains_key(key);
            if !keep_root {
                props.insert(key.clone(), value.clone());
            }
        }
    }

    /// Stash props for a parent-driven update.
    pub(crate) fn set_next(&self, props: Option<Props>) {
        self.state.lock().next = Some(props);
    }

    /// Re-render now. A queued re-render of this instance is dropped, since
    /// this one reads the same state.
    pub fn update(&self) {
        if let Some(effect) = self.effect.get() {
            self.renderer
                .runtime()
                .scheduler()
                .invalidate_job(JobId::Effect(effect.id()));
            effect.run();
        }
    }

    /// Stop the render effect and release the subtree.
    pub(crate) fn unmount(&self, remove: bool) {
        let subtree = {
            let mut state = self.state.lock();
            if state.unmounted {
                return;
            }
            state.unmounted = true;
            state.subtree.take()
        };

        if let Some(effect) = self.effect.get() {
            effect.stop();
        }
        debug!(component = self.name(), "unmounting component");

        if let Some(mut subtree) = subtree {
            self.renderer.unmount(&mut subtree, remove);
        }
    }

    pub fn def(&self) -> &Component {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name().unwrap_or("anonymous")
    }

    /// The declared props, reactive.
    pub fn props(&self) -> &Reactive {
        &self.props
    }

    pub fn attrs(&self) -> Props {
        self.state.lock().attrs.clone()
    }

    pub fn setup_state(&self) -> SetupState {
        self.state.lock().setup.clone()
    }

    pub fn is_mounted(&self) -> bool {
        let state = self.state.lock();
        state.mounted && !state.unmounted
    }

    pub fn is_unmounted(&self) -> bool {
        self.state.lock().unmounted
    }

    /// The render effect.
    pub fn effect(&self) -> Option<&ReactiveEffect> {
        self.effect.get()
    }

    /// A copy of the last rendered subtree.
    pub fn subtree(&self) -> Option<VNode> {
        self.state.lock().subtree.clone()
    }

    pub(crate) fn with_subtree<R>(&self, f: impl FnOnce(&VNode) -> R) -> Option<R> {
        self.state.lock().subtree.as_ref().map(f)
    }

    pub fn first_host_node(&self) -> Option<HostNode> {
        self.with_subtree(|subtree| self.renderer.first_host_node(subtree))
            .flatten()
    }

    pub fn last_host_node(&self) -> Option<HostNode> {
        self.with_subtree(|subtree| self.renderer.last_host_node(subtree))
            .flatten()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Split vnode props into declared props and attrs. `key` goes to neither.
fn split_props(def: &Component, props: Option<&Props>) -> (IndexMap<String, Value>, Props) {
    let mut declared = IndexMap::new();
    let mut attrs = Props::new();

    for (key, value) in props.into_iter().flat_map(Props::iter) {
        if key == "key" {
            continue;
        }
        if def.declared_props().iter().any(|name| name == key) {
            declared.insert(key.clone(), value.clone());
        } else {
            attrs.insert(key.clone(), value.clone());
        }
    }
    (declared, attrs)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
