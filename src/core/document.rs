use crate::config::toml_config::{BundlerConfig, DomainDefinition};
use crate::domain::model::{ComponentMap, PathEntry};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Sections every rendered document carries, even when empty.
const BASE_SECTIONS: [&str; 4] = ["parameters", "requestBodies", "responses", "schemas"];

/// Shared skeleton for bundle and master documents.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    version: String,
    openapi_version: String,
    title_prefix: String,
    domain_extension: String,
    contact: Option<Value>,
    license: Option<Value>,
    servers: Vec<Value>,
    security_schemes: BTreeMap<String, Value>,
}

impl DocumentTemplate {
    pub fn new(config: &BundlerConfig, version: &str) -> Self {
        let output = &config.output;
        let contact = output.contact.as_ref().map(|c| {
            let mut contact = json!({"name": c.name});
            if let Some(url) = &c.url {
                contact["url"] = json!(url);
            }
            contact
        });
        let license = output.license.as_ref().map(|l| {
            let mut license = json!({"name": l.name});
            if let Some(url) = &l.url {
                license["url"] = json!(url);
            }
            license
        });
        let servers = output
            .servers
            .iter()
            .map(|server| {
                let mut value = json!({"url": server.url});
                if let Some(description) = &server.description {
                    value["description"] = json!(description);
                }
                if !server.variables.is_empty() {
                    let variables: Map<String, Value> = server
                        .variables
                        .iter()
                        .map(|(name, var)| {
                            let mut variable = json!({"default": var.default});
                            if let Some(description) = &var.description {
                                variable["description"] = json!(description);
                            }
                            (name.clone(), variable)
                        })
                        .collect();
                    value["variables"] = Value::Object(variables);
                }
                value
            })
            .collect();

        Self {
            version: version.to_string(),
            openapi_version: output.openapi_version.clone(),
            title_prefix: output.title_prefix.clone(),
            domain_extension: output.domain_extension.clone(),
            contact,
            license,
            servers,
            security_schemes: output.security_schemes.clone(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn bundle_title(&self, definition: &DomainDefinition) -> String {
        match &definition.title {
            Some(title) => title.clone(),
            None => format!("{} {} API", self.title_prefix, definition.display_name())
                .trim()
                .to_string(),
        }
    }

    pub fn bundle_description(&self, definition: &DomainDefinition) -> String {
        match &definition.description {
            Some(description) => description.clone(),
            None => format!(
                "{} {} API specifications",
                self.title_prefix,
                definition.display_name()
            )
            .trim()
            .to_string(),
        }
    }

    pub fn render_bundle(
        &self,
        definition: &DomainDefinition,
        paths: &BTreeMap<String, PathEntry>,
        components: &ComponentMap,
        tags: &[Value],
    ) -> Value {
        let mut document = self.render(
            &self.bundle_title(definition),
            &self.bundle_description(definition),
            paths,
            components,
            tags,
        );
        document["info"][self.domain_extension.as_str()] = json!(definition.name);
        document
    }

    pub fn render(
        &self,
        title: &str,
        description: &str,
        paths: &BTreeMap<String, PathEntry>,
        components: &ComponentMap,
        tags: &[Value],
    ) -> Value {
        let mut info = json!({
            "title": title,
            "description": description,
            "version": self.version,
        });
        if let Some(contact) = &self.contact {
            info["contact"] = contact.clone();
        }
        if let Some(license) = &self.license {
            info["license"] = license.clone();
        }

        let path_items: Map<String, Value> = paths
            .iter()
            .map(|(url, entry)| (url.clone(), entry.to_value()))
            .collect();

        let mut sections = Map::new();
        for section in BASE_SECTIONS {
            sections.insert(section.to_string(), json!({}));
        }
        for (section, entries) in components {
            let entries: Map<String, Value> = entries
                .iter()
                .map(|(name, definition)| (name.clone(), definition.clone()))
                .collect();
            sections.insert(section.clone(), Value::Object(entries));
        }
        if !self.security_schemes.is_empty() {
            let schemes: Map<String, Value> = self
                .security_schemes
                .iter()
                .map(|(name, scheme)| (name.clone(), scheme.clone()))
                .collect();
            sections.insert("securitySchemes".to_string(), Value::Object(schemes));
        }

        let security: Vec<Value> = self
            .security_schemes
            .keys()
            .map(|name| {
                let mut requirement = Map::new();
                requirement.insert(name.clone(), json!([]));
                Value::Object(requirement)
            })
            .collect();

        let mut document = json!({
            "openapi": self.openapi_version,
            "info": info,
            "paths": Value::Object(path_items),
            "components": Value::Object(sections),
            "tags": tags,
        });
        if !self.servers.is_empty() {
            document["servers"] = Value::Array(self.servers.clone());
        }
        if !security.is_empty() {
            document["security"] = Value::Array(security);
        }
        document
    }
}

/// operationIds already handed out inside one output document.
#[derive(Debug, Default)]
pub struct OperationIds {
    seen: BTreeSet<String>,
}

impl OperationIds {
    /// Registers the operation's id. A repeat becomes `<prefix>_<id>`, then
    /// `<prefix>_<id>_<n>`. Returns `true` when the id was changed.
    pub fn claim(&mut self, operation: &mut Value, prefix: &str) -> bool {
        let Some(id) = operation
            .get("operationId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
        else {
            return false;
        };
        if self.seen.insert(id.clone()) {
            return false;
        }

        let mut candidate = format!("{}_{}", prefix, id);
        let mut counter = 1;
        while self.seen.contains(&candidate) {
            candidate = format!("{}_{}_{}", prefix, id, counter);
            counter += 1;
        }
        operation["operationId"] = Value::String(candidate.clone());
        self.seen.insert(candidate);
        true
    }
}

/// Tag objects with a name, first definition wins, sorted by name.
pub fn merge_tags<'a>(tags: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
    let mut merged: BTreeMap<String, Value> = BTreeMap::new();
    for tag in tags {
        if let Some(name) = tag.get("name").and_then(Value::as_str) {
            merged.entry(name.to_string()).or_insert_with(|| tag.clone());
        }
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Method;

    const CONFIG: &str = r#"
fallback_domain = "other"

[output]
title_prefix = "Acme"

[output.contact]
name = "Acme Docs"
url = "https://docs.example.com"

[[output.servers]]
url = "https://{tenant}.example.com"
description = "Tenant console"

[output.servers.variables.tenant]
default = "console"

[[domains]]
name = "load_balancer"

[[domains]]
name = "other"
title = "Everything Else"
"#;

    fn template() -> (DocumentTemplate, BundlerConfig) {
        let config = BundlerConfig::from_toml_str(CONFIG).unwrap();
        (DocumentTemplate::new(&config, "2026.01.01"), config)
    }

    #[test]
    fn test_bundle_titles() {
        let (template, config) = template();
        assert_eq!(
            template.bundle_title(&config.domains[0]),
            "Acme Load Balancer API"
        );
        assert_eq!(template.bundle_title(&config.domains[1]), "Everything Else");
        assert_eq!(
            template.bundle_description(&config.domains[0]),
            "Acme Load Balancer API specifications"
        );
    }

    #[test]
    fn test_render_bundle_skeleton() {
        let (template, config) = template();
        let mut entry = PathEntry::new("/lb");
        entry.operations.insert(Method::Get, json!({"summary": "List"}));
        let mut paths = BTreeMap::new();
        paths.insert("/lb".to_string(), entry);

        let doc = template.render_bundle(&config.domains[0], &paths, &ComponentMap::new(), &[]);

        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["info"]["version"], "2026.01.01");
        assert_eq!(doc["info"]["x-bundle-domain"], "load_balancer");
        assert_eq!(doc["info"]["contact"]["url"], "https://docs.example.com");
        assert_eq!(doc["servers"][0]["variables"]["tenant"]["default"], "console");
        assert_eq!(doc["security"], json!([{"ApiToken": []}]));
        assert_eq!(doc["components"]["schemas"], json!({}));
        assert!(doc["components"]["securitySchemes"]["ApiToken"].is_object());
        assert_eq!(doc["paths"]["/lb"]["get"]["summary"], "List");
    }

    #[test]
    fn test_operation_ids_prefix_repeats() {
        let mut ids = OperationIds::default();
        let mut first = json!({"operationId": "List"});
        let mut second = json!({"operationId": "List"});
        let mut third = json!({"operationId": "List"});
        let mut anonymous = json!({"summary": "no id"});

        assert!(!ids.claim(&mut first, "dns"));
        assert!(ids.claim(&mut second, "dns"));
        assert!(ids.claim(&mut third, "dns"));
        assert!(!ids.claim(&mut anonymous, "dns"));

        assert_eq!(first["operationId"], "List");
        assert_eq!(second["operationId"], "dns_List");
        assert_eq!(third["operationId"], "dns_List_1");
    }

    #[test]
    fn test_merge_tags_dedups_and_sorts() {
        let tags = [
            json!({"name": "zones", "description": "first"}),
            json!({"name": "alpha"}),
            json!({"name": "zones", "description": "second"}),
            json!({"description": "nameless"}),
        ];
        let merged = merge_tags(tags.iter());
        assert_eq!(
            merged,
            vec![
                json!({"name": "alpha"}),
                json!({"name": "zones", "description": "first"})
            ]
        );
    }
}
