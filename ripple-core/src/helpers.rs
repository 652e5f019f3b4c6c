//! Render helpers used by templates and hand-written render functions.

use crate::reactive::{Handler, Value};
use crate::vnode::Props;

/// One element visited by [`render_list`].
#[derive(Debug, Clone)]
pub struct ListItem {
    pub value: Value,
    /// The property name when iterating an object.
    pub key: Option<String>,
    pub index: usize,
}

/// Map every element of `source` through `f`.
///
/// - a number `n` yields `1, 2, ...` for every index below `n`
/// - a string yields its characters
/// - an array, raw or reactive, yields its elements
/// - an object, raw or reactive, yields its values with their keys
///
/// Reactive sources are read through the proxy, so the calling effect tracks
/// their length and every element. Anything else yields nothing.
pub fn render_list<T>(source: &Value, mut f: impl FnMut(ListItem) -> T) -> Vec<T> {
    let item = |value: Value, key: Option<String>, index: usize| ListItem { value, key, index };

    match source {
        Value::Number(n) => {
            // Counts up while the index is below `n`, so 2.5 yields three items.
            let count = if n.is_finite() && *n > 0.0 { n.ceil() as usize } else { 0 };
            (0..count).map(|i| f(item(Value::from(i + 1), None, i))).collect()
        }
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| f(item(Value::from(c.to_string()), None, i)))
            .collect(),
        Value::Array(array) => array
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(i, v)| f(item(v, None, i)))
            .collect(),
        Value::Object(object) => object
            .entries()
            .into_iter()
            .enumerate()
            .map(|(i, (k, v))| f(item(v, Some(k), i)))
            .collect(),
        Value::Reactive(proxy) if proxy.is_array() => (0..proxy.len())
            .map(|i| f(item(proxy.at(i), None, i)))
            .collect(),
        Value::Reactive(proxy) => proxy
            .entries()
            .into_iter()
            .enumerate()
            .map(|(i, (k, v))| f(item(v, Some(k), i)))
            .collect(),
        Value::Ref(_) | Value::Computed(_) => render_list(&source.unwrap_ref(), f),
        Value::Null | Value::Bool(_) | Value::Handler(_) => Vec::new(),
    }
}

/// Wire a two-way binding onto the props of an `input`.
///
/// - `type="radio"`: checked when the model equals `value`; a change writes
///   the event value.
/// - `type="checkbox"` with an array model: checked when the model contains
///   `value`; a change toggles the event value in the model.
/// - `type="checkbox"` otherwise: the model is the checked state.
/// - any other input: the model is the value, written back on input.
///
/// Other tags are returned unchanged.
pub fn with_model<G, S>(tag: &str, props: Option<Props>, getter: G, setter: S) -> Props
where
    G: Fn() -> Value + Send + Sync + 'static,
    S: Fn(Value) + Send + Sync + 'static,
{
    let mut props = props.unwrap_or_default();
    if tag != "input" {
        return props;
    }

    let input_type = props.get("type").and_then(|t| t.as_str().map(str::to_string));

    match input_type.as_deref() {
        Some("radio") => {
            let own = props.get("value").cloned().unwrap_or_default();
            props.insert("checked", getter().same_value(&own));
            props.insert("onChange", Handler::new(move |e| setter(e.value.clone())));
        }
        Some("checkbox") => {
            let model = getter();
            match array_items(&model) {
                Some(items) => {
                    let own = props.get("value").cloned().unwrap_or_default();
                    props.insert("checked", items.iter().any(|v| v.same_value(&own)));
                    props.insert(
                        "onChange",
                        Handler::new(move |e| {
                            let mut values = array_items(&getter()).unwrap_or_default();
                            match values.iter().position(|v| v.same_value(&e.value)) {
                                Some(at) => {
                                    values.remove(at);
                                }
                                None => values.push(e.value.clone()),
                            }
                            setter(Value::array(values));
                        }),
                    );
                }
                None => {
                    props.insert("checked", model.truthy());
                    props.insert("onChange", Handler::new(move |e| setter(Value::Bool(e.checked))));
                }
            }
        }
        _ => {
            props.insert("value", getter());
            props.insert("onInput", Handler::new(move |e| setter(e.value.clone())));
        }
    }
    props
}

fn array_items(value: &Value) -> Option<Vec<Value>> {
    match value.unwrap_ref() {
        Value::Array(array) => Some(array.to_vec()),
        Value::Reactive(proxy) if proxy.is_array() => Some(proxy.raw_items()),
        _ => None,
    }
}

/// `my-prop` to `myProp`.
pub fn camelize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '-' && (next.is_alphanumeric() || next == '_') => {
                out.extend(next.to_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Upper-case the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
