//! Reconciler Tests
//!
//! These tests drive the renderer against the recording host and assert on
//! the exact adapter calls it makes.

use std::sync::Arc;

use ripple_core::component::{Component, SetupState};
use ripple_core::config::{KeyedDetection, RuntimeConfig};
use ripple_core::host::{HostAdapter, HostNode, HostOp, RecordingHost};
use ripple_core::reactive::Runtime;
use ripple_core::renderer::Renderer;
use ripple_core::vnode::{fragment, h, text, Props, VNode};

fn setup() -> (Arc<RecordingHost>, Renderer, HostNode) {
    setup_with(Runtime::new())
}

fn setup_with(runtime: Runtime) -> (Arc<RecordingHost>, Renderer, HostNode) {
    let host = Arc::new(RecordingHost::new());
    let renderer = Renderer::new(&runtime, host.clone());
    let container = host.create_container();
    (host, renderer, container)
}

fn keyed_list(keys: &[&str]) -> VNode {
    h(
        "ul",
        None,
        keys.iter()
            .map(|k| h("li", Props::new().with("key", *k), *k))
            .collect::<Vec<_>>(),
    )
}

fn list_items(host: &RecordingHost, container: HostNode) -> Vec<HostNode> {
    let ul = host.children(container)[0];
    host.children(ul)
}

fn moves(ops: &[HostOp]) -> usize {
    ops.iter().filter(|op| matches!(op, HostOp::Insert { .. })).count()
}

fn creates_or_removes(ops: &[HostOp]) -> usize {
    ops.iter()
        .filter(|op| op.is_create() || matches!(op, HostOp::Remove { .. }))
        .count()
}

/// Test that a rotation reuses every node and moves exactly one.
#[test]
fn rotation_moves_one_node() {
    let (host, renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c"])), root);
    let before = list_items(&host, root);
    host.take_ops();

    renderer.render(Some(keyed_list(&["c", "a", "b"])), root);
    let ops = host.take_ops();

    assert_eq!(creates_or_removes(&ops), 0);
    assert_eq!(moves(&ops), 1);
    assert_eq!(list_items(&host, root), vec![before[2], before[0], before[1]]);
    assert_eq!(host.text_content(root), "cab");
}

/// Test that moving the head to the tail touches only that node.
#[test]
fn head_moves_to_tail() {
    let (host, renderer, root) = setup();
    renderer.render(Some(keyed_list(&["1", "2", "3"])), root);
    let before = list_items(&host, root);
    host.take_ops();

    renderer.render(Some(keyed_list(&["2", "3", "1"])), root);
    let ops = host.take_ops();

    assert_eq!(creates_or_removes(&ops), 0);
    let ul = host.children(root)[0];
    assert_eq!(
        ops,
        vec![HostOp::Insert { parent: ul, node: before[0], anchor: None }]
    );
    assert_eq!(host.text_content(root), "231");
}

/// Test a mixed diff: removals, insertions and a reorder in one pass.
#[test]
fn keyed_diff_mounts_moves_and_unmounts() {
    let (host, renderer, root) = setup();
    renderer.render(Some(keyed_list(&["a", "b", "c", "d", "e", "f"])), root);
    let before = list_items(&host, root);

    renderer.render(Some(keyed_list(&["a", "d", "x", "c", "b", "f"])), root);

    assert_eq!(host.text_content(root), "adxcbf");
    let after = list_items(&host, root);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[3]);
    assert_eq!(after[3], before[2]);
    assert_eq!(after[4], before[1]);
    assert_eq!(after[5], before[5]);
    assert!(!before.contains(&after[2]));
    assert_eq!(host.parent(before[4]), None);
}

/// Test that new keys at the front mount before the first old node.
#[test]
fn prepend_mounts_before_existing_nodes() {
    let (host, renderer, root) = setup();
    renderer.render(Some(keyed_list(&["c", "d"])), root);
    host.take_ops();

    renderer.render(Some(keyed_list(&["a", "b", "c", "d"])), root);
    let ops = host.take_ops();

    assert_eq!(host.text_content(root), "abcd");
    assert_eq!(ops.iter().filter(|op| op.is_create()).count(), 2);
    assert!(!ops.iter().any(|op| matches!(op, HostOp::Remove { .. })));
}

/// Test that patching a tree against an identical copy makes no calls.
#[test]
fn identical_rerender_is_silent() {
    let (host, renderer, root) = setup();
    let tree = h(
        "div",
        Props::new().with("id", "app").with("class", "x"),
        vec![
            keyed_list(&["a", "b"]),
            fragment(vec![text("t"), h("br", None, ())]),
            h("p", None, "hello"),
        ],
    );

    renderer.render(Some(tree.clone()), root);
    host.take_ops();

    renderer.render(Some(tree), root);
    assert!(host.take_ops().is_empty());
}

/// Test that a component re-rendered by its parent with the same props makes
/// no calls either.
#[test]
fn identical_component_rerender_is_silent() {
    let (host, renderer, root) = setup();
    let child = Component::builder()
        .props(["n"])
        .setup(|_| SetupState::new())
        .render(|ctx| h("b", None, ctx.value("n")))
        .build();
    let tree = |n: i32| h("div", None, vec![h(&child, Props::new().with("n", n), ())]);

    renderer.render(Some(tree(1)), root);
    host.take_ops();

    renderer.render(Some(tree(1)), root);
    assert!(host.take_ops().is_empty());

    renderer.render(Some(tree(2)), root);
    assert_eq!(host.to_html(root), "<div><b>2</b></div>");
}

/// Test that mounting then unmounting leaves the container as it was.
#[test]
fn mount_unmount_symmetry() {
    let (host, renderer, root) = setup();
    let existing = host.create_element("aside");
    host.insert_before(root, existing, None);
    let html_before = host.to_html(root);

    let child = Component::from_render(|_| fragment(vec![text("x"), h("i", None, ())]));
    let tree = h(
        "section",
        None,
        vec![keyed_list(&["a"]), h(&child, None, ()), fragment(vec![text("y")])],
    );

    renderer.render(Some(tree), root);
    assert_ne!(host.to_html(root), html_before);

    renderer.render(None, root);
    assert_eq!(host.to_html(root), html_before);
    assert_eq!(host.children(root), vec![existing]);
}

/// Test that churning through distinct lists does not grow the host.
#[test]
fn list_churn_frees_removed_nodes() {
    let (host, renderer, root) = setup();
    let baseline = host.node_count();

    for round in 0..50 {
        let keys: Vec<String> = (0..20).map(|i| format!("{round}-{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        renderer.render(Some(keyed_list(&keys)), root);
        assert_eq!(host.node_count(), baseline + host.descendant_count(root));
    }

    renderer.render(None, root);
    assert_eq!(host.node_count(), baseline);
}

/// Test that a keyed component moves all of its host nodes.
#[test]
fn keyed_components_move_whole_subtrees() {
    let (host, renderer, root) = setup();
    let item = Component::builder()
        .props(["label"])
        .render(|ctx| fragment(vec![text(ctx.value("label").to_display_string()), text(";")]))
        .build();
    let list = |labels: &[&str]| {
        h(
            "div",
            None,
            labels
                .iter()
                .map(|l| h(&item, Props::new().with("key", *l).with("label", *l), ()))
                .collect::<Vec<_>>(),
        )
    };

    renderer.render(Some(list(&["a", "b", "c"])), root);
    renderer.render(Some(list(&["c", "b", "a"])), root);

    assert_eq!(host.text_content(root), "c;b;a;");
}

/// Test that a node of a different type replaces the old one in place.
#[test]
fn type_change_replaces_in_place() {
    let (host, renderer, root) = setup();
    renderer.render(
        Some(h("div", None, vec![text("a"), h("b", None, ()), text("c")])),
        root,
    );
    renderer.render(
        Some(h("div", None, vec![text("a"), fragment(vec![text("x"), text("y")]), text("c")])),
        root,
    );

    assert_eq!(host.text_content(root), "axyc");
}

/// Test that with full keyed detection, a partially keyed list is diffed by
/// position.
#[test]
fn all_children_detection_falls_back_to_positional() {
    let mut config = RuntimeConfig::default();
    config.renderer.keyed_detection = KeyedDetection::AllChildren;
    let (host, renderer, root) = setup_with(Runtime::with_config(config));

    let partial = |first: &str, second: &str| {
        h(
            "ul",
            None,
            vec![
                h("li", Props::new().with("key", first), first),
                h("li", None, second),
            ],
        )
    };

    renderer.render(Some(partial("a", "b")), root);
    let before = list_items(&host, root);
    host.take_ops();

    renderer.render(Some(partial("z", "b")), root);
    let ops = host.take_ops();

    // Positional diff: same elements, first text updated in place.
    assert_eq!(list_items(&host, root), before);
    assert_eq!(creates_or_removes(&ops), 0);
    assert_eq!(host.text_content(root), "zb");
}
