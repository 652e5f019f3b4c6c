//! Integration Tests for the Reactive Runtime
//!
//! These tests verify that reactive state, the scheduler, components and the
//! reconciler work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use ripple_core::component::{Component, SetupState};
use ripple_core::config::{FallthroughPrecedence, RuntimeConfig};
use ripple_core::host::{HostAdapter, HostOp, RecordingHost};
use ripple_core::reactive::{Event, Handler, Runtime, Value};
use ripple_core::vnode::{h, Props};
use ripple_core::App;

fn counter(runtime: &Runtime, host: &Arc<RecordingHost>) -> (App, ripple_core::Ref) {
    let count = runtime.create_ref(0);
    let state = count.clone();
    let root = Component::builder()
        .name("Counter")
        .setup(move |_| SetupState::new().with("count", state.clone()))
        .render(|ctx| h("p", None, ctx.value("count")))
        .build();
    (App::new(runtime, host.clone(), root), count)
}

/// Test that only effects that read a key are notified when it changes.
#[test]
fn effects_track_exactly_the_keys_they_read() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Value::object([("a", 1), ("b", 1)]));
    let proxy = state.as_reactive().unwrap().clone();

    let a_runs = Arc::new(AtomicI32::new(0));
    let b_runs = Arc::new(AtomicI32::new(0));

    let (p, runs) = (proxy.clone(), a_runs.clone());
    let _a = runtime.effect(move || {
        p.get("a");
        runs.fetch_add(1, Ordering::SeqCst);
    });
    let (p, runs) = (proxy.clone(), b_runs.clone());
    let _b = runtime.effect(move || {
        p.get("b");
        runs.fetch_add(1, Ordering::SeqCst);
    });

    proxy.set("a", 2);
    assert_eq!(a_runs.load(Ordering::SeqCst), 2);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);

    // Same value: nobody is notified.
    proxy.set("a", 2);
    proxy.set("b", 1);
    assert_eq!(a_runs.load(Ordering::SeqCst), 2);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
}

/// Test that writing NaN over NaN is not a change.
#[test]
fn nan_writes_are_suppressed() {
    let runtime = Runtime::new();
    let cell = runtime.create_ref(f64::NAN);
    let runs = Arc::new(AtomicI32::new(0));

    let (c, r) = (cell.clone(), runs.clone());
    let _effect = runtime.effect(move || {
        c.get();
        r.fetch_add(1, Ordering::SeqCst);
    });

    cell.set(f64::NAN);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that a computed recomputes at most once per source change.
#[test]
fn computed_is_lazy_and_cached() {
    let runtime = Runtime::new();
    let source = runtime.create_ref(2);
    let computes = Arc::new(AtomicI32::new(0));

    let (s, c) = (source.clone(), computes.clone());
    let squared = runtime.computed(move || {
        c.fetch_add(1, Ordering::SeqCst);
        let n = s.get().as_f64().unwrap_or(0.0);
        n * n
    });
    assert_eq!(computes.load(Ordering::SeqCst), 0);

    assert_eq!(squared.get(), Value::from(4));
    assert_eq!(squared.get(), Value::from(4));
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    source.set(3);
    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert_eq!(squared.get(), Value::from(9));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}

/// Test the counter scenario: the text updates after a flush and the host
/// node is reused.
#[test]
fn counter_updates_in_place_after_flush() {
    let runtime = Runtime::new();
    let host = Arc::new(RecordingHost::new());
    let container = host.create_container();
    let (app, count) = counter(&runtime, &host);

    app.mount(container).unwrap();
    assert_eq!(host.to_html(container), "<p>0</p>");
    let p = host.children(container)[0];
    host.take_ops();

    count.set(1);
    assert_eq!(host.to_html(container), "<p>0</p>");
    runtime.run_microtasks();

    assert_eq!(host.to_html(container), "<p>1</p>");
    assert_eq!(host.children(container), vec![p]);
    assert_eq!(
        host.take_ops(),
        vec![HostOp::SetText { node: p, content: "1".into() }]
    );
}

/// Test that an event handler updating state re-renders the component.
#[test]
fn click_handler_drives_a_rerender() {
    let runtime = Runtime::new();
    let host = Arc::new(RecordingHost::new());
    let container = host.create_container();

    let count = runtime.create_ref(0);
    let state = count.clone();
    let root = Component::builder()
        .setup(move |_| {
            let c = state.clone();
            let inc = Handler::new(move |_| c.update(|v| v.as_f64().unwrap_or(0.0) + 1.0));
            SetupState::new().with("count", state.clone()).with("inc", inc)
        })
        .render(|ctx| {
            h(
                "button",
                Props::new().with("onClick", ctx.get("inc")),
                ctx.value("count"),
            )
        })
        .build();

    let app = App::new(&runtime, host.clone(), root);
    app.mount(container).unwrap();

    let button = host.children(container)[0];
    host.dispatch(button, &Event::new("click"));
    host.dispatch(button, &Event::new("click"));
    runtime.run_microtasks();

    assert_eq!(count.get(), Value::from(2));
    assert_eq!(host.to_html(container), "<button>2</button>");
    // The handler is the same value every render: it is attached once.
    assert_eq!(host.listener_count(button, "click"), 1);
}

/// Test that a parent re-render passes new props to its child synchronously.
#[test]
fn parent_props_update_child_in_the_same_flush() {
    let runtime = Runtime::new();
    let host = Arc::new(RecordingHost::new());
    let container = host.create_container();
    let child_renders = Arc::new(AtomicI32::new(0));

    let renders = child_renders.clone();
    let child = Component::builder()
        .name("Label")
        .props(["text"])
        .render(move |ctx| {
            renders.fetch_add(1, Ordering::SeqCst);
            h("span", None, ctx.value("text"))
        })
        .build();

    let label = runtime.create_ref("a");
    let state = label.clone();
    let root = Component::builder()
        .setup(move |_| SetupState::new().with("label", state.clone()))
        .render(move |ctx| {
            h(
                "div",
                None,
                vec![h(&child, Props::new().with("text", ctx.value("label")), ())],
            )
        })
        .build();

    let app = App::new(&runtime, host.clone(), root);
    app.mount(container).unwrap();
    assert_eq!(host.to_html(container), "<div><span>a</span></div>");

    label.set("b");
    runtime.run_microtasks();

    assert_eq!(host.to_html(container), "<div><span>b</span></div>");
    assert_eq!(child_renders.load(Ordering::SeqCst), 2);
    assert!(!runtime.is_flush_pending());
}

/// Test that undeclared props fall through to the root element, and that the
/// root's own value wins by default.
#[test]
fn attrs_fall_through_to_the_root() {
    let render = |runtime: &Runtime| {
        let host = Arc::new(RecordingHost::new());
        let container = host.create_container();

        let child = Component::builder()
            .props(["label"])
            .render(|ctx| h("button", Props::new().with("class", "btn"), ctx.value("label")))
            .build();
        let props = Props::new()
            .with("label", "ok")
            .with("id", "submit")
            .with("class", "primary");
        let root = Component::from_render(move |_| h(&child, props.clone(), ()));

        App::new(runtime, host.clone(), root).mount(container).unwrap();
        let button = host.children(container)[0];
        (host.attribute(button, "id"), host.class(button), host.to_html(container))
    };

    let (id, class, html) = render(&Runtime::new());
    assert_eq!(id.as_deref(), Some("submit"));
    assert_eq!(class, "btn");
    assert!(html.ends_with(">ok</button>"));

    let mut config = RuntimeConfig::default();
    config.renderer.fallthrough = FallthroughPrecedence::AttrsWin;
    let (_, class, _) = render(&Runtime::with_config(config));
    assert_eq!(class, "primary");
}

/// Test that unmounting the app releases every host node and effect.
#[test]
fn unmount_releases_everything() {
    let runtime = Runtime::new();
    let host = Arc::new(RecordingHost::new());
    let container = host.create_container();
    let (app, count) = counter(&runtime, &host);

    app.mount(container).unwrap();
    let instance = app.root_instance().unwrap();
    app.unmount();

    assert_eq!(host.descendant_count(container), 0);
    assert!(instance.is_unmounted());

    count.set(5);
    assert!(!runtime.is_flush_pending());
}

/// Test that the recorded patch stream can be shipped and replayed.
#[test]
fn patch_stream_replays_on_another_host() {
    let runtime = Runtime::new();
    let host = Arc::new(RecordingHost::new());
    let container = host.create_container();
    let (app, _count) = counter(&runtime, &host);
    app.mount(container).unwrap();

    let bytes = host.encode_ops().unwrap();
    let ops = RecordingHost::decode_ops(&bytes).unwrap();

    let replica = RecordingHost::new();
    let root = replica.create_container();
    let mut nodes = std::collections::HashMap::new();
    nodes.insert(container, root);
    for op in ops {
        match op {
            HostOp::CreateElement { node, tag } => {
                nodes.insert(node, replica.create_element(&tag));
            }
            HostOp::CreateText { node, content } => {
                nodes.insert(node, replica.create_text(&content));
            }
            HostOp::SetText { node, content } => replica.set_text(nodes[&node], &content),
            HostOp::Insert { parent, node, anchor } => {
                replica.insert_before(nodes[&parent], nodes[&node], anchor.map(|a| nodes[&a]))
            }
            other => panic!("unexpected op in counter mount: {other:?}"),
        }
    }

    assert_eq!(replica.to_html(root), host.to_html(container));
}
