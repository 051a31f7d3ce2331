use crate::utils::error::{BundleError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Path-item extension that pins a route to a domain from inside a source document.
pub const PATH_OVERRIDE_EXTENSION: &str = "x-bundle-domain";

/// `section -> name -> definition`, e.g. `schemas -> Foo -> {...}`.
pub type ComponentMap = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
        Method::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
            Method::Trace => "trace",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_ascii_lowercase();
        Method::ALL.into_iter().find(|m| m.as_str() == lower)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    pub section: String,
    pub name: String,
}

impl ComponentKey {
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
        }
    }

    pub fn schema(name: impl Into<String>) -> Self {
        Self::new("schemas", name)
    }

    /// Local `$ref` string pointing at this component.
    pub fn pointer(&self) -> String {
        format!(
            "#/components/{}/{}",
            crate::core::refs::escape_pointer_segment(&self.section),
            crate::core::refs::escape_pointer_segment(&self.name)
        )
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.section, self.name)
    }
}

/// One API route: a URL template with its per-method operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathEntry {
    pub url: String,
    pub operations: BTreeMap<Method, Value>,
    /// Path-item fields that are not operations (`parameters`, `summary`, `servers`, ...).
    pub shared: Map<String, Value>,
    /// Domains named by the in-document override extension, in declared order.
    pub overrides: Vec<String>,
}

impl PathEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    fn from_value(url: &str, value: Value) -> Option<Self> {
        let Value::Object(item) = value else {
            return None;
        };

        let mut entry = PathEntry::new(url);
        for (key, value) in item {
            if key == PATH_OVERRIDE_EXTENSION {
                match value {
                    Value::String(domain) => entry.overrides.push(domain),
                    Value::Array(items) => entry.overrides.extend(
                        items
                            .into_iter()
                            .filter_map(|v| v.as_str().map(str::to_owned)),
                    ),
                    _ => {}
                }
                continue;
            }
            match Method::parse(&key) {
                Some(method) => {
                    entry.operations.insert(method, value);
                }
                None => {
                    entry.shared.insert(key, value);
                }
            }
        }
        Some(entry)
    }

    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.operations.keys().copied()
    }

    /// Reassembles the path item object.
    pub fn to_value(&self) -> Value {
        let mut item = self.shared.clone();
        for (method, operation) in &self.operations {
            item.insert(method.as_str().to_string(), operation.clone());
        }
        Value::Object(item)
    }

    /// Lowercased tags, summaries and descriptions of every operation.
    pub fn keyword_text(&self) -> String {
        let mut parts = Vec::new();
        for operation in self.operations.values() {
            if let Some(tags) = operation.get("tags").and_then(Value::as_array) {
                parts.extend(tags.iter().filter_map(Value::as_str).map(str::to_owned));
            }
            for field in ["summary", "description"] {
                if let Some(text) = operation.get(field).and_then(Value::as_str) {
                    parts.push(text.to_string());
                }
            }
        }
        parts.join(" ").to_lowercase()
    }
}

/// One input specification, keyed by its file name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceDocument {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub paths: BTreeMap<String, PathEntry>,
    pub components: ComponentMap,
    pub tags: Vec<Value>,
}

impl SourceDocument {
    pub fn from_slice(id: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let id = id.into();
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| BundleError::InvalidDocumentError {
                document: id.clone(),
                message: e.to_string(),
            })?;
        Self::from_value(id, value)
    }

    pub fn from_value(id: impl Into<String>, value: Value) -> Result<Self> {
        let id = id.into();
        let Value::Object(mut root) = value else {
            return Err(BundleError::InvalidDocumentError {
                document: id,
                message: "top-level value is not an object".to_string(),
            });
        };

        let info = root.remove("info").unwrap_or(Value::Null);
        let title = info.get("title").and_then(Value::as_str).map(str::to_owned);
        let description = info
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let mut paths = BTreeMap::new();
        match root.remove("paths") {
            Some(Value::Object(items)) => {
                for (url, item) in items {
                    match PathEntry::from_value(&url, item) {
                        Some(entry) => {
                            paths.insert(url, entry);
                        }
                        None => tracing::warn!("{}: path item '{}' is not an object", id, url),
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(BundleError::InvalidDocumentError {
                    document: id,
                    message: "'paths' is not an object".to_string(),
                })
            }
        }

        let mut components = ComponentMap::new();
        if let Some(Value::Object(sections)) = root.remove("components") {
            for (section, entries) in sections {
                if let Value::Object(entries) = entries {
                    components.insert(section, entries.into_iter().collect());
                }
            }
        }

        let tags = match root.remove("tags") {
            Some(Value::Array(tags)) => tags,
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            title,
            description,
            paths,
            components,
            tags,
        })
    }

    pub fn schemas(&self) -> Option<&BTreeMap<String, Value>> {
        self.components.get("schemas")
    }

    pub fn component(&self, key: &ComponentKey) -> Option<&Value> {
        self.components.get(&key.section)?.get(&key.name)
    }

    /// Components wrapped as `{"components": {...}}` so local pointers resolve against it.
    pub fn components_root(&self) -> Value {
        let sections: Map<String, Value> = self
            .components
            .iter()
            .map(|(section, entries)| {
                let entries: Map<String, Value> = entries
                    .iter()
                    .map(|(name, def)| (name.clone(), def.clone()))
                    .collect();
                (section.clone(), Value::Object(entries))
            })
            .collect();
        let mut root = Map::new();
        root.insert("components".to_string(), Value::Object(sections));
        Value::Object(root)
    }
}

/// A finished per-domain bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainBundle {
    pub domain: String,
    pub paths: BTreeMap<String, PathEntry>,
    pub components: ComponentMap,
    pub tags: Vec<Value>,
    pub document: Value,
}

impl DomainBundle {
    pub fn file_name(&self) -> String {
        format!("{}.json", self.domain)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn schema_count(&self) -> usize {
        self.components.get("schemas").map(|s| s.len()).unwrap_or(0)
    }
}

/// Everything a successful transform produces.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub bundles: Vec<DomainBundle>,
    pub master: Value,
    pub index: Value,
}

pub const MASTER_FILE: &str = "openapi.json";
pub const INDEX_FILE: &str = "index.json";

impl BundleOutput {
    pub fn artifacts(&self, indent: usize) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(self.bundles.len() + 2);
        for bundle in &self.bundles {
            artifacts.push(Artifact::json(bundle.file_name(), &bundle.document, indent)?);
        }
        artifacts.push(Artifact::json(MASTER_FILE, &self.master, indent)?);
        artifacts.push(Artifact::json(INDEX_FILE, &self.index, indent)?);
        Ok(artifacts)
    }
}

/// A file ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn json(file_name: impl Into<String>, value: &Value, indent: usize) -> Result<Self> {
        Ok(Self {
            file_name: file_name.into(),
            contents: crate::utils::json::to_canonical_bytes(value, indent)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document_splits_methods_and_shared_fields() {
        let doc = SourceDocument::from_value(
            "ves.io.schema.dns_zone.json",
            json!({
                "info": {"title": "DNS Zone", "description": "Zones"},
                "paths": {
                    "/api/config/namespaces/{ns}/dns_zones": {
                        "parameters": [{"name": "ns", "in": "path"}],
                        "GET": {"summary": "List"},
                        "post": {"summary": "Create"},
                        "x-bundle-domain": "dns"
                    }
                },
                "components": {"schemas": {"Zone": {"type": "object"}}},
                "tags": [{"name": "dns"}]
            }),
        )
        .unwrap();

        assert_eq!(doc.title.as_deref(), Some("DNS Zone"));
        let entry = &doc.paths["/api/config/namespaces/{ns}/dns_zones"];
        assert_eq!(
            entry.methods().collect::<Vec<_>>(),
            vec![Method::Get, Method::Post]
        );
        assert!(entry.shared.contains_key("parameters"));
        assert_eq!(entry.overrides, vec!["dns".to_string()]);
        assert!(doc.component(&ComponentKey::schema("Zone")).is_some());
        assert_eq!(doc.tags.len(), 1);
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = SourceDocument::from_value("bad.json", json!([1, 2])).unwrap_err();
        assert!(matches!(err, BundleError::InvalidDocumentError { .. }));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = SourceDocument::from_slice("broken.json", b"{not json").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_path_entry_round_trips_to_value() {
        let mut entry = PathEntry::new("/a");
        entry
            .operations
            .insert(Method::Get, json!({"summary": "x"}));
        entry.shared.insert("summary".to_string(), json!("shared"));
        assert_eq!(
            entry.to_value(),
            json!({"get": {"summary": "x"}, "summary": "shared"})
        );
    }

    #[test]
    fn test_keyword_text_collects_tags_and_descriptions() {
        let mut entry = PathEntry::new("/a");
        entry.operations.insert(
            Method::Get,
            json!({"tags": ["DNS"], "summary": "Zone LIST", "description": "Lists zones"}),
        );
        let text = entry.keyword_text();
        assert!(text.contains("dns"));
        assert!(text.contains("zone list"));
        assert!(text.contains("lists zones"));
    }

    #[test]
    fn test_component_pointer_escapes_slashes() {
        let key = ComponentKey::schema("a/b~c");
        assert_eq!(key.pointer(), "#/components/schemas/a~1b~0c");
    }
}
