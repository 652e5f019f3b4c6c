//! Property patching.
//!
//! Props are split into five classes by key:
//!
//! - `class`: assigned as the class string.
//! - `style`: diffed per style property.
//! - `on` followed by a non-lowercase character: an event listener.
//! - camelCase keys and `value`, `checked`, `selected`, `muted`, `disabled`:
//!   assigned as properties.
//! - anything else: a string attribute, removed on null or `false`.

use tracing::trace;

use super::{HostAdapter, HostNode};
use crate::reactive::Value;
use crate::vnode::Props;

const DOM_PROPS: [&str; 5] = ["value", "checked", "selected", "muted", "disabled"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropClass {
    /// The diff key; never reaches the host.
    Key,
    Class,
    Style,
    /// Listener for the contained lower-cased event name.
    Event(String),
    DomProp,
    Attr,
}

impl PropClass {
    pub fn classify(key: &str) -> PropClass {
        match key {
            "key" => PropClass::Key,
            "class" => PropClass::Class,
            "style" => PropClass::Style,
            _ if is_event_key(key) => PropClass::Event(key[2..].to_lowercase()),
            _ if DOM_PROPS.contains(&key) || key.chars().any(|c| c.is_ascii_uppercase()) => {
                PropClass::DomProp
            }
            _ => PropClass::Attr,
        }
    }
}

fn is_event_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 2 && bytes.starts_with(b"on") && !bytes[2].is_ascii_lowercase()
}

/// Apply the difference between two prop sets to `el`.
pub fn patch_props(host: &dyn HostAdapter, el: HostNode, old: Option<&Props>, new: Option<&Props>) {
    let empty = Props::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    for (key, next) in new.iter() {
        if key == "key" {
            continue;
        }
        let prev = old.get(key);
        if prev.map_or(true, |prev| !prev.same_value(next)) {
            patch_prop(host, el, key, prev, Some(next));
        }
    }

    for (key, prev) in old.iter() {
        if key != "key" && !new.contains_key(key) {
            patch_prop(host, el, key, Some(prev), None);
        }
    }
}

/// Apply one prop change. `None` means the prop is gone.
pub fn patch_prop(
    host: &dyn HostAdapter,
    el: HostNode,
    key: &str,
    prev: Option<&Value>,
    next: Option<&Value>,
) {
    let null = Value::Null;
    let next = next.unwrap_or(&null);
    trace!(el = el.raw(), key, "patch prop");

    match PropClass::classify(key) {
        PropClass::Key => {}
        PropClass::Class => {
            let class = if next.truthy() { next.to_display_string() } else { String::new() };
            host.set_class(el, &class);
        }
        PropClass::Style => patch_style(host, el, prev, next),
        PropClass::Event(event) => {
            let prev = prev.and_then(Value::as_handler);
            let next = next.as_handler();
            let unchanged = match (prev, next) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            if let Some(prev) = prev {
                host.remove_listener(el, &event, prev);
            }
            if let Some(next) = next {
                host.add_listener(el, &event, next.clone());
            }
        }
        PropClass::DomProp => {
            let is_empty_string = next.as_str() == Some("");
            if is_empty_string && host.is_boolean_property(el, key) {
                // `<input checked>` compiles to `checked: ""`.
                host.set_property(el, key, &Value::Bool(true));
            } else {
                host.set_property(el, key, next);
            }
        }
        PropClass::Attr => match next {
            Value::Null | Value::Bool(false) => host.remove_attribute(el, key),
            value => host.set_attribute(el, key, &value.to_display_string()),
        },
    }
}

fn patch_style(host: &dyn HostAdapter, el: HostNode, prev: Option<&Value>, next: &Value) {
    if next.is_null() {
        host.remove_attribute(el, "style");
        return;
    }

    let prev = prev.map(style_entries).unwrap_or_default();
    let next = style_entries(next);
    let lookup = |entries: &[(String, Value)], name: &str| {
        entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };

    for (name, value) in &next {
        if lookup(&prev, name).same_value(value) {
            continue;
        }
        if value.is_null() {
            host.set_style(el, name, None);
        } else {
            host.set_style(el, name, Some(&value.to_display_string()));
        }
    }

    for (name, value) in &prev {
        if !value.is_null() && lookup(&next, name).is_null() {
            host.set_style(el, name, None);
        }
    }
}

fn style_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(object) => object.entries(),
        Value::Reactive(proxy) => proxy.raw_entries(),
        _ => Vec::new(),
    }
}
