use crate::config::toml_config::{BundlerConfig, ComplexityConfig, DomainDefinition};
use crate::core::catalog::DomainCatalog;
use crate::core::document::{merge_tags, DocumentTemplate, OperationIds};
use crate::domain::model::{ComponentMap, DomainBundle, PathEntry};
use crate::utils::error::{BundleError, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Folds every bundle back into one master document and builds the index.
pub struct MasterAggregator<'a> {
    catalog: &'a DomainCatalog,
    template: &'a DocumentTemplate,
    complexity: ComplexityConfig,
    master_title: String,
    master_description: String,
}

impl<'a> MasterAggregator<'a> {
    pub fn new(
        config: &BundlerConfig,
        catalog: &'a DomainCatalog,
        template: &'a DocumentTemplate,
    ) -> Self {
        Self {
            catalog,
            template,
            complexity: config.complexity.clone(),
            master_title: config.output.master_title.clone(),
            master_description: config.output.master_description.clone(),
        }
    }

    /// Returns `(master, index)`.
    ///
    /// A component name defined differently by two bundles means the inputs
    /// disagree about it; the run must stop rather than pick a variant.
    pub fn aggregate(&self, bundles: &[DomainBundle]) -> Result<(Value, Value)> {
        let mut paths: BTreeMap<String, PathEntry> = BTreeMap::new();
        let mut components = ComponentMap::new();
        let mut origins: BTreeMap<(String, String), &str> = BTreeMap::new();
        let mut ids = OperationIds::default();
        let mut renamed = 0;

        for bundle in bundles {
            for (url, entry) in &bundle.paths {
                let merged = paths
                    .entry(url.clone())
                    .or_insert_with(|| PathEntry::new(url.as_str()));
                for (key, value) in &entry.shared {
                    if !merged.shared.contains_key(key) {
                        merged.shared.insert(key.clone(), value.clone());
                    }
                }
                for (method, operation) in &entry.operations {
                    let mut operation = operation.clone();
                    if ids.claim(&mut operation, &bundle.domain) {
                        renamed += 1;
                    }
                    merged.operations.insert(*method, operation);
                }
            }

            for (section, entries) in &bundle.components {
                let target = components.entry(section.clone()).or_default();
                for (name, definition) in entries {
                    match target.get(name) {
                        Some(existing) if existing != definition => {
                            let first = origins
                                .get(&(section.clone(), name.clone()))
                                .copied()
                                .unwrap_or_default();
                            return Err(BundleError::SchemaConflictError {
                                section: section.clone(),
                                name: name.clone(),
                                first: first.to_string(),
                                second: bundle.domain.clone(),
                            });
                        }
                        Some(_) => {}
                        None => {
                            target.insert(name.clone(), definition.clone());
                            origins.insert((section.clone(), name.clone()), &bundle.domain);
                        }
                    }
                }
            }
        }

        if renamed > 0 {
            tracing::debug!("Prefixed {} cross-domain operationIds in the master document", renamed);
        }

        let tags = merge_tags(bundles.iter().flat_map(|b| b.tags.iter()));
        let master = self.template.render(
            &self.master_title,
            &self.master_description,
            &paths,
            &components,
            &tags,
        );

        tracing::info!(
            "Master document holds {} paths and {} schemas",
            paths.len(),
            components.get("schemas").map(|s| s.len()).unwrap_or(0)
        );

        Ok((master, self.index(bundles)))
    }

    fn index(&self, bundles: &[DomainBundle]) -> Value {
        let specifications: Vec<Value> = bundles
            .iter()
            .map(|bundle| {
                let definition = self
                    .catalog
                    .definition(&bundle.domain)
                    .cloned()
                    .unwrap_or_else(|| DomainDefinition::named(&bundle.domain));
                let path_count = bundle.path_count();

                let mut entry = json!({
                    "domain": bundle.domain,
                    "title": self.template.bundle_title(&definition),
                    "description": self.template.bundle_description(&definition),
                    "file": bundle.file_name(),
                    "path_count": path_count,
                    "schema_count": bundle.schema_count(),
                    "complexity": self.complexity.tier(path_count),
                    "is_preview": definition.is_preview,
                    "requires_tier": definition.requires_tier,
                    "domain_category": definition.category,
                    "use_cases": definition.use_cases,
                    "related_domains": self.catalog.related_domains(&bundle.domain),
                });
                if let Some(metadata) = &definition.cli_metadata {
                    entry["cli_metadata"] = metadata.clone();
                }
                entry
            })
            .collect();

        json!({
            "version": self.template.version(),
            "specifications": specifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Method;
    use serde_json::json;

    const CONFIG: &str = r#"
fallback_domain = "other"

[output]
master_title = "Acme API"

[complexity]
moderate_min_paths = 2
advanced_min_paths = 3

[[domains]]
name = "dns"
category = "Networking"
requires_tier = "Advanced"
use_cases = ["Manage zones"]
related_domains = ["net_legacy", "dns"]

[[domains]]
name = "networking"
is_preview = true

[domains.cli_metadata]
quick_start = "xcsh networking list"

[[domains]]
name = "other"

[[aliases]]
deprecated = "net_legacy"
successor = "networking"
"#;

    fn setup() -> (BundlerConfig, DomainCatalog, DocumentTemplate) {
        let config = BundlerConfig::from_toml_str(CONFIG).unwrap();
        let catalog = DomainCatalog::from_config(&config).unwrap();
        let template = DocumentTemplate::new(&config, "2.0.0");
        (config, catalog, template)
    }

    fn bundle(domain: &str, urls: &[(&str, Method, &str)], schemas: Value) -> DomainBundle {
        let mut paths: BTreeMap<String, PathEntry> = BTreeMap::new();
        for (url, method, id) in urls {
            paths
                .entry(url.to_string())
                .or_insert_with(|| PathEntry::new(*url))
                .operations
                .insert(*method, json!({"operationId": id, "summary": "s"}));
        }
        let mut components = ComponentMap::new();
        if let Value::Object(map) = schemas {
            components.insert("schemas".to_string(), map.into_iter().collect());
        }
        DomainBundle {
            domain: domain.to_string(),
            paths,
            components,
            tags: vec![json!({"name": domain})],
            document: Value::Null,
        }
    }

    #[test]
    fn test_master_unions_paths_and_methods() {
        let (config, catalog, template) = setup();
        let aggregator = MasterAggregator::new(&config, &catalog, &template);
        let bundles = vec![
            bundle("dns", &[("/x", Method::Get, "Get")], json!({"A": {"type": "string"}})),
            bundle(
                "networking",
                &[("/x", Method::Post, "Create"), ("/y", Method::Get, "Get")],
                json!({"A": {"type": "string"}, "B": {"type": "integer"}}),
            ),
        ];

        let (master, _) = aggregator.aggregate(&bundles).unwrap();
        assert_eq!(master["info"]["title"], "Acme API");
        assert!(master["paths"]["/x"]["get"].is_object());
        assert!(master["paths"]["/x"]["post"].is_object());
        assert_eq!(master["paths"]["/y"]["get"]["operationId"], "networking_Get");
        assert_eq!(master["components"]["schemas"].as_object().unwrap().len(), 2);
        assert_eq!(master["tags"], json!([{"name": "dns"}, {"name": "networking"}]));
    }

    #[test]
    fn test_structural_mismatch_is_fatal() {
        let (config, catalog, template) = setup();
        let aggregator = MasterAggregator::new(&config, &catalog, &template);
        let bundles = vec![
            bundle("dns", &[], json!({"A": {"type": "string"}})),
            bundle("networking", &[], json!({"A": {"type": "object"}})),
        ];

        match aggregator.aggregate(&bundles) {
            Err(BundleError::SchemaConflictError { name, first, second, .. }) => {
                assert_eq!(name, "A");
                assert_eq!(first, "dns");
                assert_eq!(second, "networking");
            }
            other => panic!("expected a schema conflict, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_index_entries() {
        let (config, catalog, template) = setup();
        let aggregator = MasterAggregator::new(&config, &catalog, &template);
        let bundles = vec![
            bundle(
                "dns",
                &[("/a", Method::Get, "a"), ("/b", Method::Get, "b")],
                json!({}),
            ),
            bundle("networking", &[("/c", Method::Get, "c")], json!({"N": {}})),
        ];

        let (_, index) = aggregator.aggregate(&bundles).unwrap();
        assert_eq!(index["version"], "2.0.0");
        assert!(index.get("timestamp").is_none());

        let dns = &index["specifications"][0];
        assert_eq!(dns["domain"], "dns");
        assert_eq!(dns["file"], "dns.json");
        assert_eq!(dns["path_count"], 2);
        assert_eq!(dns["schema_count"], 0);
        assert_eq!(dns["complexity"], "moderate");
        assert_eq!(dns["requires_tier"], "Advanced");
        assert_eq!(dns["domain_category"], "Networking");
        assert_eq!(dns["use_cases"], json!(["Manage zones"]));
        assert_eq!(dns["related_domains"], json!(["networking"]));
        assert!(dns.get("cli_metadata").is_none());

        let networking = &index["specifications"][1];
        assert_eq!(networking["is_preview"], true);
        assert_eq!(networking["complexity"], "simple");
        assert_eq!(networking["domain_category"], "Other");
        assert_eq!(networking["cli_metadata"]["quick_start"], "xcsh networking list");
    }
}
