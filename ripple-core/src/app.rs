//! Application Boundary
//!
//! An [`App`] ties a root component to a renderer and a host container. It
//! owns the component registry used by name lookups from render functions,
//! and optionally a [`TemplateCompiler`] for components that ship a template
//! instead of a render function.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ripple_core::app::App;
//! use ripple_core::component::{Component, SetupState};
//! use ripple_core::host::RecordingHost;
//! use ripple_core::reactive::Runtime;
//! use ripple_core::vnode::h;
//!
//! let runtime = Runtime::new();
//! let host = Arc::new(RecordingHost::new());
//! let container = host.create_container();
//!
//! let count = runtime.create_ref(0);
//! let state = count.clone();
//! let root = Component::builder()
//!     .setup(move |_| SetupState::new().with("count", state.clone()))
//!     .render(|ctx| h("p", None, ctx.value("count")))
//!     .build();
//!
//! let app = App::new(&runtime, host.clone(), root);
//! app.mount(container).unwrap();
//! assert_eq!(host.to_html(container), "<p>0</p>");
//!
//! count.set(1);
//! runtime.run_microtasks();
//! assert_eq!(host.to_html(container), "<p>1</p>");
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::component::{Component, ComponentInstance, RenderFn};
use crate::error::{Result, RuntimeError};
use crate::helpers::{camelize, capitalize};
use crate::host::{HostAdapter, HostNode};
use crate::reactive::Runtime;
use crate::renderer::Renderer;
use crate::vnode::h;

/// Turns template text into a render function.
///
/// Compilation errors are reported as plain messages; the caller wraps them
/// in [`RuntimeError::Compile`].
pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, template: &str) -> std::result::Result<RenderFn, String>;
}

impl<F> TemplateCompiler for F
where
    F: Fn(&str) -> std::result::Result<RenderFn, String> + Send + Sync,
{
    fn compile(&self, template: &str) -> std::result::Result<RenderFn, String> {
        self(template)
    }
}

/// Named components, looked up tolerantly.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<IndexMap<String, Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, component: Component) {
        self.components.write().insert(name.into(), component);
    }

    /// Find `name` as given, camelized, or camelized and capitalized, so
    /// `my-button` finds `MyButton`.
    pub fn resolve(&self, name: &str) -> Option<Component> {
        resolve_in(&self.components.read(), name)
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}

pub(crate) fn resolve_in(components: &IndexMap<String, Component>, name: &str) -> Option<Component> {
    if let Some(found) = components.get(name) {
        return Some(found.clone());
    }
    let camel = camelize(name);
    components
        .get(&camel)
        .or_else(|| components.get(&capitalize(&camel)))
        .cloned()
}

/// A mounted (or mountable) application.
pub struct App {
    renderer: Renderer,
    root: Component,
    container: Mutex<Option<HostNode>>,
}

impl App {
    /// Create an app. Components registered on the root definition are added
    /// to the registry.
    pub fn new(runtime: &Runtime, host: Arc<dyn HostAdapter>, root: Component) -> Self {
        let renderer = Renderer::new(runtime, host);
        for (name, component) in root.components() {
            renderer.registry().register(name.clone(), component.clone());
        }

        Self {
            renderer,
            root,
            container: Mutex::new(None),
        }
    }

    /// Use `compiler` for template-only components.
    pub fn with_compiler(self, compiler: impl TemplateCompiler + 'static) -> Self {
        self.renderer.set_compiler(Arc::new(compiler));
        self
    }

    /// Register a component by name, compiling its template if needed.
    pub fn component(&self, name: impl Into<String>, component: Component) -> Result<&Self> {
        self.prepare(&component)?;
        self.renderer.registry().register(name, component);
        Ok(self)
    }

    fn prepare(&self, component: &Component) -> Result<()> {
        if component.has_render() {
            return Ok(());
        }

        let name = component.name().unwrap_or("anonymous").to_string();
        if component.template().is_none() {
            return Err(RuntimeError::MissingRender { component: name });
        }

        match self.renderer.compiler() {
            Some(compiler) => component.compile_with(compiler.as_ref()).map(drop),
            None => Err(RuntimeError::Compile {
                component: name,
                message: "no template compiler registered".to_string(),
            }),
        }
    }

    /// Render the root component into `container`.
    pub fn mount(&self, container: HostNode) -> Result<()> {
        self.prepare(&self.root)?;

        debug!(
            container = container.raw(),
            component = self.root.name().unwrap_or("anonymous"),
            "mounting app"
        );
        self.renderer.render(Some(h(&self.root, None, ())), container);
        *self.container.lock() = Some(container);
        Ok(())
    }

    /// Tear the app down. Every render effect is stopped.
    pub fn unmount(&self) {
        if let Some(container) = self.container.lock().take() {
            debug!(container = container.raw(), "unmounting app");
            self.renderer.render(None, container);
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn runtime(&self) -> &Runtime {
        self.renderer.runtime()
    }

    /// The root component's instance while mounted.
    pub fn root_instance(&self) -> Option<Arc<ComponentInstance>> {
        let container = (*self.container.lock())?;
        self.renderer.root(container)?.component().cloned()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("root", &self.root)
            .field("container", &*self.container.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::render_fn;
    use crate::host::RecordingHost;
    use crate::vnode::RenderOutput;

    fn leaf(name: &str) -> Component {
        let text = name.to_string();
        Component::builder()
            .name(name)
            .render(move |_| RenderOutput::from(text.clone()))
            .build()
    }

    #[test]
    fn registry_resolves_kebab_and_camel_names() {
        let registry = ComponentRegistry::new();
        let button = leaf("MyButton");
        registry.register("MyButton", button.clone());

        assert!(registry.resolve("MyButton").is_some_and(|c| c.ptr_eq(&button)));
        assert!(registry.resolve("my-button").is_some_and(|c| c.ptr_eq(&button)));
        assert!(registry.resolve("myButton").is_some_and(|c| c.ptr_eq(&button)));
        assert!(registry.resolve("other").is_none());
    }

    #[test]
    fn template_component_needs_a_compiler() {
        let runtime = Runtime::new();
        let host = Arc::new(RecordingHost::new());
        let root = Component::builder().name("Root").template("<p/>").build();

        let app = App::new(&runtime, host.clone(), root);
        let err = app.mount(host.create_container()).unwrap_err();
        assert!(matches!(err, RuntimeError::Compile { .. }));
    }

    #[test]
    fn component_without_render_or_template_is_rejected() {
        let runtime = Runtime::new();
        let app = App::new(&runtime, Arc::new(RecordingHost::new()), leaf("Root"));

        let err = app
            .component("Broken", Component::builder().name("Broken").build())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingRender { .. }));
    }

    #[test]
    fn compiled_root_mounts_and_unmounts() {
        let runtime = Runtime::new();
        let host = Arc::new(RecordingHost::new());
        let container = host.create_container();

        let compiler = |template: &str| -> std::result::Result<RenderFn, String> {
            let text = template.to_uppercase();
            Ok(render_fn(move |_| RenderOutput::from(text.clone())))
        };
        let root = Component::builder().template("hello").build();
        let app = App::new(&runtime, host.clone(), root).with_compiler(compiler);

        app.mount(container).unwrap();
        assert_eq!(host.to_html(container), "HELLO");
        assert!(app.root_instance().is_some());

        app.unmount();
        assert_eq!(host.descendant_count(container), 0);
        assert!(app.root_instance().is_none());
    }

    #[test]
    fn render_context_resolves_registered_components() {
        let runtime = Runtime::new();
        let host = Arc::new(RecordingHost::new());
        let container = host.create_container();

        let root = Component::builder()
            .render(|ctx| match ctx.resolve_component("child-item") {
                Some(child) => h(&child, None, ()),
                None => h("missing", None, ()),
            })
            .build();
        let app = App::new(&runtime, host.clone(), root);
        app.component("ChildItem", leaf("ChildItem")).unwrap();

        app.mount(container).unwrap();
        assert_eq!(host.to_html(container), "ChildItem");
    }
}
