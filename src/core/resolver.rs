use crate::config::toml_config::BundlerConfig;
use crate::core::refs::{component_key, escape_pointer_segment, resolve_pointer};
use crate::domain::model::{ComponentKey, SourceDocument};
use crate::domain::report::{OperationRef, RunReport};
use crate::utils::error::Result;
use crate::utils::validation::validate_regex;
use regex::Regex;
use serde_json::{json, Value};

const REQUEST_BODIES: &str = "requestBodies";

/// What to do with one `$ref` that was found while walking a document.
#[derive(Debug, Clone, PartialEq)]
enum RefOutcome {
    Keep,
    Retarget(String),
    Inline(Value),
    Drop,
}

/// Makes every local pointer in a document resolvable, or removes it.
///
/// Resolvable pointers are never touched. A dangling pointer is first offered
/// to the rewrite rules (the rewritten target must resolve), then, for request
/// bodies, replaced by a generic inline body; otherwise the object holding it
/// is removed from its parent.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    rewrites: Vec<(Regex, String)>,
    remove_ref_siblings: bool,
    inline_orphan_request_bodies: bool,
}

impl ReferenceResolver {
    pub fn new(config: &BundlerConfig) -> Result<Self> {
        let rewrites = config
            .resolver
            .rewrites
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let regex = validate_regex(&format!("resolver.rewrites[{}]", i), &rule.pattern)?;
                Ok((regex, rule.replacement.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rewrites,
            remove_ref_siblings: config.processing.remove_ref_siblings,
            inline_orphan_request_bodies: config.processing.inline_orphan_request_bodies,
        })
    }

    pub fn resolve(&self, mut document: SourceDocument, report: &mut RunReport) -> SourceDocument {
        let id = document.id.clone();

        // Dropping a component can strand pointers into it, so repeat until stable.
        loop {
            let mut walker = RefWalker::new(self, &id, document.components_root(), report);
            let mut removed = Vec::new();
            for (section, entries) in document.components.iter_mut() {
                for (name, definition) in entries.iter_mut() {
                    let location = ComponentKey::new(section.as_str(), name.as_str()).pointer();
                    if !walker.walk(definition, &location) {
                        removed.push((section.clone(), name.clone()));
                    }
                }
            }
            let dropped = walker.dropped;

            for (section, name) in removed {
                if let Some(entries) = document.components.get_mut(&section) {
                    entries.remove(&name);
                }
            }
            if dropped == 0 {
                break;
            }
        }

        let mut walker = RefWalker::new(self, &id, document.components_root(), report);
        for (url, entry) in document.paths.iter_mut() {
            let base = format!("#/paths/{}", escape_pointer_segment(url));

            let shared_keys: Vec<String> = entry.shared.keys().cloned().collect();
            for key in shared_keys {
                let location = format!("{}/{}", base, escape_pointer_segment(&key));
                let keep = match entry.shared.get_mut(&key) {
                    Some(value) => walker.walk(value, &location),
                    None => true,
                };
                if !keep {
                    entry.shared.remove(&key);
                }
            }

            // A whole operation can only be a `$ref` in malformed input; dropping
            // it leaves an empty operation for the merger to discard.
            for (method, operation) in entry.operations.iter_mut() {
                let location = format!("{}/{}", base, method.as_str());
                if !walker.walk(operation, &location) {
                    *operation = json!({});
                }
            }
        }

        for (url, entry) in &document.paths {
            for (method, operation) in &entry.operations {
                if !has_response_schema(operation) {
                    report.record_missing_response_schema(OperationRef::new(&id, url, *method));
                }
            }
        }

        document
    }
}

struct RefWalker<'a> {
    resolver: &'a ReferenceResolver,
    document: &'a str,
    snapshot: Value,
    report: &'a mut RunReport,
    dropped: usize,
}

impl<'a> RefWalker<'a> {
    fn new(
        resolver: &'a ReferenceResolver,
        document: &'a str,
        snapshot: Value,
        report: &'a mut RunReport,
    ) -> Self {
        Self {
            resolver,
            document,
            snapshot,
            report,
            dropped: 0,
        }
    }

    /// Returns `false` when `value` must be removed from its parent.
    fn walk(&mut self, value: &mut Value, location: &str) -> bool {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str).map(str::to_owned) {
            return self.visit_ref(value, &reference, location);
        }

        match value {
            Value::Object(map) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    let child_location = format!("{}/{}", location, escape_pointer_segment(&key));
                    let keep = match map.get_mut(&key) {
                        Some(child) => self.walk(child, &child_location),
                        None => true,
                    };
                    if !keep {
                        map.remove(&key);
                    }
                }
                true
            }
            Value::Array(items) => {
                let mut index = 0;
                items.retain_mut(|item| {
                    let keep = self.walk(item, &format!("{}/{}", location, index));
                    index += 1;
                    keep
                });
                true
            }
            _ => true,
        }
    }

    fn visit_ref(&mut self, value: &mut Value, reference: &str, location: &str) -> bool {
        if let Value::Object(map) = value {
            if self.resolver.remove_ref_siblings && map.len() > 1 {
                map.retain(|key, _| key == "$ref");
                self.report.ref_siblings_removed += 1;
            }
        }

        match self.decide(reference, location) {
            RefOutcome::Keep => true,
            RefOutcome::Retarget(target) => {
                value["$ref"] = Value::String(target);
                true
            }
            RefOutcome::Inline(replacement) => {
                *value = replacement;
                true
            }
            RefOutcome::Drop => {
                self.dropped += 1;
                false
            }
        }
    }

    fn decide(&mut self, reference: &str, location: &str) -> RefOutcome {
        if resolve_pointer(&self.snapshot, reference).is_some() {
            return RefOutcome::Keep;
        }

        for (pattern, replacement) in &self.resolver.rewrites {
            if !pattern.is_match(reference) {
                continue;
            }
            let candidate = pattern.replace(reference, replacement.as_str()).into_owned();
            if candidate != reference && resolve_pointer(&self.snapshot, &candidate).is_some() {
                self.report
                    .record_rewritten_ref(self.document, location, reference, &candidate);
                return RefOutcome::Retarget(candidate);
            }
        }

        if self.resolver.inline_orphan_request_bodies {
            if let Some(key) = component_key(reference).filter(|k| k.section == REQUEST_BODIES) {
                self.report
                    .record_rewritten_ref(self.document, location, reference, "inline");
                return RefOutcome::Inline(generic_request_body(&key.name));
            }
        }

        self.report.record_dropped_ref(self.document, location, reference);
        RefOutcome::Drop
    }
}

fn generic_request_body(name: &str) -> Value {
    json!({
        "description": format!("Request body (originally referenced {})", name),
        "content": {
            "application/json": {
                "schema": {"type": "object"}
            }
        }
    })
}

/// True when at least one response carries a schema, directly or by reference.
fn has_response_schema(operation: &Value) -> bool {
    let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
        return false;
    };
    responses.values().any(|response| {
        if response.get("$ref").is_some() || response.get("schema").is_some() {
            return true;
        }
        response
            .get("content")
            .and_then(Value::as_object)
            .map(|content| content.values().any(|media| media.get("schema").is_some()))
            .unwrap_or(false)
    })
}
