//! JSON pointer helpers for local `$ref` values.

use crate::domain::model::{ComponentKey, ComponentMap};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};

const COMPONENTS_PREFIX: &str = "#/components/";

pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

pub fn decode_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Component that owns the target of a `#/components/<section>/<name>[/...]` pointer.
pub fn component_key(reference: &str) -> Option<ComponentKey> {
    let rest = reference.strip_prefix(COMPONENTS_PREFIX)?;
    let mut segments = rest.split('/');
    let section = segments.next().filter(|s| !s.is_empty())?;
    let name = segments.next().filter(|s| !s.is_empty())?;
    Some(ComponentKey::new(
        decode_pointer_segment(section),
        decode_pointer_segment(name),
    ))
}

/// Looks a local pointer up in `root`. Non-local references never resolve.
pub fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}

/// Every `$ref` string under `value`.
pub fn collect_refs(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                out.insert(reference.clone());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

pub fn component_keys(value: &Value) -> BTreeSet<ComponentKey> {
    let mut refs = BTreeSet::new();
    collect_refs(value, &mut refs);
    refs.iter().filter_map(|r| component_key(r)).collect()
}

/// Components transitively reachable from `seeds`, seeds included.
///
/// Self-referential and mutually recursive definitions are visited once.
/// Keys with no definition in `components` are skipped.
pub fn component_closure(
    components: &ComponentMap,
    seeds: impl IntoIterator<Item = ComponentKey>,
) -> BTreeSet<ComponentKey> {
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<ComponentKey> = seeds.into_iter().collect();

    while let Some(key) = queue.pop_front() {
        if visited.contains(&key) {
            continue;
        }
        let Some(definition) = components.get(&key.section).and_then(|s| s.get(&key.name)) else {
            continue;
        };
        for next in component_keys(definition) {
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
        visited.insert(key);
    }

    visited
}
