use crate::config::toml_config::{BundlerConfig, DomainDefinition};
use crate::core::classifier::{Classification, Classifier, RuleLayer};
use crate::core::document::{merge_tags, DocumentTemplate, OperationIds};
use crate::core::refs::{component_closure, component_keys};
use crate::domain::model::{ComponentKey, ComponentMap, DomainBundle, Method, PathEntry, SourceDocument};
use crate::domain::report::{
    Collision, DomainCounts, KeywordTie, OperationRef, RunReport, SubjectKind,
};
use crate::utils::error::{BundleError, Result};
use crate::utils::validation::validate_regex;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// An operation offered to a domain by one source document.
struct Claim<'d> {
    document: usize,
    url: &'d str,
    operation: &'d Value,
    shared: &'d serde_json::Map<String, Value>,
    classification: Classification,
}

/// Per-domain state while operations and components are collected.
#[derive(Default)]
struct Draft {
    paths: BTreeMap<String, PathEntry>,
    /// Source document of every merged operation.
    origins: BTreeMap<(String, Method), usize>,
    /// Component seeds per contributing source document.
    seeds: BTreeMap<usize, BTreeSet<ComponentKey>>,
    components: ComponentMap,
    component_origins: BTreeMap<ComponentKey, usize>,
}

impl Draft {
    /// Documents that contributed at least one operation.
    fn operation_sources(&self) -> BTreeSet<usize> {
        self.origins.values().copied().collect()
    }

    fn add_component(
        &mut self,
        key: &ComponentKey,
        definition: &Value,
        document: usize,
        documents: &[SourceDocument],
    ) -> Result<()> {
        let section = self.components.entry(key.section.clone()).or_default();
        match section.get(&key.name) {
            Some(existing) if existing != definition => {
                let first = self
                    .component_origins
                    .get(key)
                    .map(|&i| documents[i].id.clone())
                    .unwrap_or_default();
                Err(BundleError::SchemaConflictError {
                    section: key.section.clone(),
                    name: key.name.clone(),
                    first,
                    second: documents[document].id.clone(),
                })
            }
            Some(_) => Ok(()),
            None => {
                section.insert(key.name.clone(), definition.clone());
                self.component_origins.insert(key.clone(), document);
                Ok(())
            }
        }
    }
}

/// Groups classified operations and their reachable components into one
/// self-contained document per domain.
pub struct BundleMerger<'a> {
    classifier: &'a Classifier,
    template: &'a DocumentTemplate,
    include_unreferenced_schemas: bool,
    prefix_strip: Option<Regex>,
}

impl<'a> BundleMerger<'a> {
    pub fn new(
        config: &BundlerConfig,
        classifier: &'a Classifier,
        template: &'a DocumentTemplate,
    ) -> Result<Self> {
        let prefix_strip = config
            .processing
            .operation_id_prefix_strip
            .as_deref()
            .map(|pattern| validate_regex("processing.operation_id_prefix_strip", pattern))
            .transpose()?;

        Ok(Self {
            classifier,
            template,
            include_unreferenced_schemas: config.processing.include_unreferenced_schemas,
            prefix_strip,
        })
    }

    pub fn merge(
        &self,
        documents: &[SourceDocument],
        report: &mut RunReport,
    ) -> Result<Vec<DomainBundle>> {
        let claims = self.collect_claims(documents, report);
        let mut drafts: BTreeMap<String, Draft> = BTreeMap::new();

        for ((url, method), mut group) in claims {
            let catalog = self.classifier.catalog();
            group.sort_by(|a, b| {
                a.classification
                    .precedence(catalog)
                    .cmp(&b.classification.precedence(catalog))
                    .then_with(|| documents[a.document].id.cmp(&documents[b.document].id))
            });

            let mut group = group.into_iter();
            let Some(winner) = group.next() else {
                continue;
            };
            for loser in group {
                let dropped = OperationRef::new(&documents[loser.document].id, &url, method);
                if loser.classification.domain == winner.classification.domain {
                    report.record_duplicate_operation(dropped);
                } else {
                    report.record_collision(Collision {
                        path: url.clone(),
                        method: method.as_str().to_string(),
                        kept_domain: winner.classification.domain.clone(),
                        kept_document: documents[winner.document].id.clone(),
                        dropped_domain: loser.classification.domain.clone(),
                        dropped_document: dropped.document,
                        resolved_by_override: winner.classification.layer == RuleLayer::Override,
                    });
                }
            }

            let draft = drafts
                .entry(winner.classification.domain.clone())
                .or_default();
            let seeds = draft.seeds.entry(winner.document).or_default();
            seeds.extend(component_keys(winner.operation));

            let entry = draft
                .paths
                .entry(url.clone())
                .or_insert_with(|| PathEntry::new(winner.url));
            entry.operations.insert(method, winner.operation.clone());
            for (key, value) in winner.shared {
                if !entry.shared.contains_key(key) {
                    entry.shared.insert(key.clone(), value.clone());
                    seeds.extend(component_keys(value));
                }
            }
            draft.origins.insert((url, method), winner.document);
        }

        // Copy every component the merged operations reach, per source document.
        let mut reached: Vec<BTreeSet<ComponentKey>> = vec![BTreeSet::new(); documents.len()];
        for draft in drafts.values_mut() {
            let seeds = std::mem::take(&mut draft.seeds);
            for (&index, keys) in &seeds {
                let document = &documents[index];
                for key in component_closure(&document.components, keys.iter().cloned()) {
                    if let Some(definition) = document.component(&key) {
                        draft.add_component(&key, definition, index, documents)?;
                    }
                    reached[index].insert(key);
                }
            }
            draft.seeds = seeds;
        }

        if self.include_unreferenced_schemas {
            self.place_unreferenced_schemas(documents, &mut reached, &mut drafts, report)?;
        }

        let mut bundles = Vec::with_capacity(drafts.len());
        for (domain, draft) in drafts {
            if draft.paths.is_empty() && draft.components.is_empty() {
                continue;
            }
            let bundle = self.finish(&domain, draft, documents, report);
            report.domains.insert(
                domain,
                DomainCounts {
                    paths: bundle.path_count(),
                    schemas: bundle.schema_count(),
                },
            );
            bundles.push(bundle);
        }

        tracing::info!(
            "Merged {} documents into {} domain bundles",
            documents.len(),
            bundles.len()
        );
        Ok(bundles)
    }

    /// Every non-empty operation, grouped by `(url, method)` in document order.
    fn collect_claims<'d>(
        &self,
        documents: &'d [SourceDocument],
        report: &mut RunReport,
    ) -> BTreeMap<(String, Method), Vec<Claim<'d>>> {
        let mut claims: BTreeMap<(String, Method), Vec<Claim<'d>>> = BTreeMap::new();

        for (index, document) in documents.iter().enumerate() {
            for (url, entry) in &document.paths {
                let operations: Vec<(Method, &Value)> = entry
                    .operations
                    .iter()
                    .filter_map(|(method, operation)| {
                        if is_empty_operation(operation) {
                            report.record_empty_operation(OperationRef::new(
                                &document.id,
                                url,
                                *method,
                            ));
                            None
                        } else {
                            Some((*method, operation))
                        }
                    })
                    .collect();
                if operations.is_empty() {
                    continue;
                }

                let classification = self.classifier.classify_path(entry, document);
                self.record_classification(&document.id, SubjectKind::Path, url, &classification, report);

                for (method, operation) in operations {
                    claims
                        .entry((url.clone(), method))
                        .or_default()
                        .push(Claim {
                            document: index,
                            url,
                            operation,
                            shared: &entry.shared,
                            classification: classification.clone(),
                        });
                }
            }
        }

        claims
    }

    /// Classifies the schemas no merged operation reaches.
    ///
    /// Only roots are classified: unreached schemas (or cycles of them) that
    /// no other unreached schema points at. Everything a root reaches travels
    /// with it, so placement never depends on schema names.
    fn place_unreferenced_schemas(
        &self,
        documents: &[SourceDocument],
        reached: &mut [BTreeSet<ComponentKey>],
        drafts: &mut BTreeMap<String, Draft>,
        report: &mut RunReport,
    ) -> Result<()> {
        let catalog = self.classifier.catalog();

        for (index, document) in documents.iter().enumerate() {
            let Some(schemas) = document.schemas() else {
                continue;
            };
            let closures: BTreeMap<ComponentKey, BTreeSet<ComponentKey>> = schemas
                .keys()
                .map(|name| ComponentKey::schema(name.as_str()))
                .filter(|key| !reached[index].contains(key))
                .map(|key| {
                    let closure = component_closure(&document.components, [key.clone()]);
                    (key, closure)
                })
                .collect();

            for group in unreferenced_roots(&closures) {
                let Some((subject, classification)) = group
                    .iter()
                    .filter_map(|key| {
                        let schema = schemas.get(&key.name)?;
                        Some((key, self.classifier.classify_schema(&key.name, schema, document)))
                    })
                    .min_by(|(_, a), (_, b)| a.precedence(catalog).cmp(&b.precedence(catalog)))
                else {
                    continue;
                };
                self.record_classification(
                    &document.id,
                    SubjectKind::Schema,
                    &subject.name,
                    &classification,
                    report,
                );

                let draft = drafts.entry(classification.domain).or_default();
                draft.seeds.entry(index).or_default().extend(group.iter().cloned());
                for member in component_closure(&document.components, group) {
                    if let Some(definition) = document.component(&member) {
                        draft.add_component(&member, definition, index, documents)?;
                    }
                    reached[index].insert(member);
                }
            }
        }
        Ok(())
    }

    fn record_classification(
        &self,
        document: &str,
        kind: SubjectKind,
        subject: &str,
        classification: &Classification,
        report: &mut RunReport,
    ) {
        if classification.layer == RuleLayer::Fallback {
            report.record_fallback(document, kind, subject);
        }
        if !classification.tied_with.is_empty() {
            report.record_keyword_tie(KeywordTie {
                document: document.to_string(),
                subject: subject.to_string(),
                chosen: classification.domain.clone(),
                tied_with: classification.tied_with.clone(),
            });
        }
    }

    fn finish(
        &self,
        domain: &str,
        mut draft: Draft,
        documents: &[SourceDocument],
        report: &mut RunReport,
    ) -> DomainBundle {
        let mut ids = OperationIds::default();
        for (url, entry) in draft.paths.iter_mut() {
            for (method, operation) in entry.operations.iter_mut() {
                let Some(&index) = draft.origins.get(&(url.clone(), *method)) else {
                    continue;
                };
                let prefix = self.source_prefix(&documents[index].id);
                if ids.claim(operation, &prefix) {
                    report.operation_ids_deduplicated += 1;
                }
            }
        }

        let mut tags: Vec<Value> = draft
            .operation_sources()
            .into_iter()
            .flat_map(|index| documents[index].tags.iter().cloned())
            .collect();
        for entry in draft.paths.values() {
            for operation in entry.operations.values() {
                if let Some(names) = operation.get("tags").and_then(Value::as_array) {
                    tags.extend(names.iter().filter_map(Value::as_str).map(|n| json!({"name": n})));
                }
            }
        }
        let tags = merge_tags(tags.iter());

        let definition = self
            .classifier
            .catalog()
            .definition(domain)
            .cloned()
            .unwrap_or_else(|| DomainDefinition::named(domain));
        let document = self
            .template
            .render_bundle(&definition, &draft.paths, &draft.components, &tags);

        DomainBundle {
            domain: domain.to_string(),
            paths: draft.paths,
            components: draft.components,
            tags,
            document,
        }
    }

    /// "ves.io.schema.dns_zone.json" -> "ves_io_schema_dns_zone", before any strip pattern.
    fn source_prefix(&self, document_id: &str) -> String {
        let stem = document_id.strip_suffix(".json").unwrap_or(document_id);
        let stem = match &self.prefix_strip {
            Some(pattern) => pattern.replace_all(stem, "").into_owned(),
            None => stem.to_string(),
        };
        let prefix: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let prefix = prefix.trim_matches('_');
        if prefix.is_empty() {
            "source".to_string()
        } else {
            prefix.to_string()
        }
    }
}

/// Groups of mutually reachable unreached schemas that nothing else unreached
/// points at. A plain root is a group of one.
fn unreferenced_roots(
    closures: &BTreeMap<ComponentKey, BTreeSet<ComponentKey>>,
) -> Vec<BTreeSet<ComponentKey>> {
    let mut roots = Vec::new();
    let mut grouped: BTreeSet<&ComponentKey> = BTreeSet::new();

    for (key, reach) in closures {
        if grouped.contains(key) {
            continue;
        }
        let group: BTreeSet<ComponentKey> = closures
            .iter()
            .filter(|(other, other_reach)| reach.contains(*other) && other_reach.contains(key))
            .map(|(other, _)| other.clone())
            .collect();
        grouped.extend(closures.keys().filter(|k| group.contains(*k)));

        let referenced = closures
            .iter()
            .any(|(other, other_reach)| !group.contains(other) && other_reach.contains(key));
        if !referenced {
            roots.push(group);
        }
    }
    roots
}

/// No parameters, responses, request body, id, summary or description.
pub fn is_empty_operation(operation: &Value) -> bool {
    let Some(fields) = operation.as_object() else {
        return true;
    };
    [
        "parameters",
        "responses",
        "requestBody",
        "operationId",
        "summary",
        "description",
    ]
    .iter()
    .all(|field| match fields.get(*field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    })
}
