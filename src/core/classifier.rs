//! Layered, first-match-wins domain classification.
//!
//! Layers, strongest first: explicit overrides, source filename patterns,
//! URL patterns, keyword scoring, fallback. Every rule target is resolved
//! through the alias table when the classifier is built, so a deprecated
//! domain name can never come out of [`Classifier::classify_path`].

use crate::config::toml_config::BundlerConfig;
use crate::core::catalog::DomainCatalog;
use crate::domain::model::{PathEntry, SourceDocument};
use crate::utils::error::Result;
use crate::utils::validation::validate_regex;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleLayer {
    Override,
    Filename,
    PathPattern,
    Keyword,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub domain: String,
    pub layer: RuleLayer,
    /// Position of the matching rule inside its layer.
    pub rule_index: usize,
    /// Domains whose keyword score tied with the winner.
    pub tied_with: Vec<String>,
}

impl Classification {
    fn new(domain: &str, layer: RuleLayer, rule_index: usize) -> Self {
        Self {
            domain: domain.to_string(),
            layer,
            rule_index,
            tied_with: Vec::new(),
        }
    }

    /// Sort key where smaller means stronger.
    pub fn precedence(&self, catalog: &DomainCatalog) -> (RuleLayer, usize, usize) {
        (self.layer, self.rule_index, catalog.position(&self.domain))
    }
}

#[derive(Debug, Clone)]
enum PathMatcher {
    Exact(String),
    Pattern(Regex),
}

impl PathMatcher {
    fn matches(&self, url: &str) -> bool {
        match self {
            PathMatcher::Exact(path) => path == url,
            PathMatcher::Pattern(re) => re.is_match(url),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    domain: String,
}

#[derive(Debug, Clone)]
struct KeywordSet {
    domain: String,
    keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    catalog: DomainCatalog,
    path_overrides: Vec<(PathMatcher, String)>,
    schema_overrides: Vec<(String, String)>,
    filename_rules: Vec<CompiledRule>,
    path_rules: Vec<CompiledRule>,
    keyword_sets: Vec<KeywordSet>,
}

impl Classifier {
    pub fn new(config: &BundlerConfig, catalog: DomainCatalog) -> Result<Self> {
        let rules = &config.rules;

        let mut path_overrides = Vec::new();
        let mut schema_overrides = Vec::new();
        for (i, rule) in rules.overrides.iter().enumerate() {
            let context = format!("rules.overrides[{}]", i);
            let domain = catalog.canonical(&rule.domain, &context)?;
            if let Some(path) = &rule.path {
                path_overrides.push((PathMatcher::Exact(path.clone()), domain));
            } else if let Some(pattern) = &rule.pattern {
                let regex = validate_regex(&context, pattern)?;
                path_overrides.push((PathMatcher::Pattern(regex), domain));
            } else if let Some(schema) = &rule.schema {
                schema_overrides.push((schema.clone(), domain));
            }
        }

        let filename_rules = compile_rules(&catalog, "rules.filename", &rules.filename)?;
        let path_rules = compile_rules(&catalog, "rules.path", &rules.path)?;

        let mut keyword_sets: Vec<KeywordSet> = Vec::new();
        for (i, rule) in rules.keywords.iter().enumerate() {
            let domain = catalog.canonical(&rule.domain, &format!("rules.keywords[{}]", i))?;
            let keywords = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty());
            // Two entries for one domain (e.g. via an alias) pool their keywords.
            match keyword_sets.iter_mut().find(|set| set.domain == domain) {
                Some(set) => set.keywords.extend(keywords),
                None => keyword_sets.push(KeywordSet {
                    domain,
                    keywords: keywords.collect(),
                }),
            }
        }
        // Ties go to the first-declared domain.
        keyword_sets.sort_by_key(|set| catalog.position(&set.domain));

        Ok(Self {
            catalog,
            path_overrides,
            schema_overrides,
            filename_rules,
            path_rules,
            keyword_sets,
        })
    }

    pub fn catalog(&self) -> &DomainCatalog {
        &self.catalog
    }

    pub fn classify_path(&self, entry: &PathEntry, document: &SourceDocument) -> Classification {
        for (i, (matcher, domain)) in self.path_overrides.iter().enumerate() {
            if matcher.matches(&entry.url) {
                return Classification::new(domain, RuleLayer::Override, i);
            }
        }

        for (i, name) in entry.overrides.iter().enumerate() {
            match self.catalog.lookup(name) {
                Some(domain) => {
                    return Classification::new(
                        &domain,
                        RuleLayer::Override,
                        self.path_overrides.len() + i,
                    )
                }
                None => tracing::warn!(
                    "{}: path '{}' names unknown domain '{}' in its override; ignoring",
                    document.id,
                    entry.url,
                    name
                ),
            }
        }

        if let Some(found) = self.match_filename(&document.id) {
            return found;
        }

        for (i, rule) in self.path_rules.iter().enumerate() {
            if rule.regex.is_match(&entry.url) {
                return Classification::new(&rule.domain, RuleLayer::PathPattern, i);
            }
        }

        if let Some(found) = self.score_keywords(&entry.keyword_text()) {
            return found;
        }

        Classification::new(self.catalog.fallback(), RuleLayer::Fallback, 0)
    }

    /// Classification for a schema that no bundled path reaches.
    pub fn classify_schema(
        &self,
        name: &str,
        schema: &Value,
        document: &SourceDocument,
    ) -> Classification {
        for (i, (schema_name, domain)) in self.schema_overrides.iter().enumerate() {
            if schema_name == name {
                return Classification::new(domain, RuleLayer::Override, i);
            }
        }

        if let Some(found) = self.match_filename(&document.id) {
            return found;
        }

        let text = ["title", "description"]
            .iter()
            .filter_map(|field| schema.get(field).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if let Some(found) = self.score_keywords(&text) {
            return found;
        }

        Classification::new(self.catalog.fallback(), RuleLayer::Fallback, 0)
    }

    fn match_filename(&self, document_id: &str) -> Option<Classification> {
        let lower = document_id.to_lowercase();
        self.filename_rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.regex.is_match(&lower))
            .map(|(i, rule)| Classification::new(&rule.domain, RuleLayer::Filename, i))
    }

    /// Highest keyword frequency wins; equal scores go to the earlier domain.
    fn score_keywords(&self, text: &str) -> Option<Classification> {
        if text.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        let mut scores = Vec::with_capacity(self.keyword_sets.len());
        for (i, set) in self.keyword_sets.iter().enumerate() {
            let score: usize = set
                .keywords
                .iter()
                .map(|keyword| text.matches(keyword.as_str()).count())
                .sum();
            scores.push(score);
            if score > 0 && best.map(|(_, top)| score > top).unwrap_or(true) {
                best = Some((i, score));
            }
        }

        let (winner, top) = best?;
        let mut classification =
            Classification::new(&self.keyword_sets[winner].domain, RuleLayer::Keyword, winner);
        classification.tied_with = scores
            .iter()
            .enumerate()
            .filter(|&(i, &score)| i != winner && score == top)
            .map(|(i, _)| self.keyword_sets[i].domain.clone())
            .collect();
        Some(classification)
    }
}

fn compile_rules(
    catalog: &DomainCatalog,
    section: &str,
    rules: &[crate::config::toml_config::PatternRule],
) -> Result<Vec<CompiledRule>> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let context = format!("{}[{}]", section, i);
            Ok(CompiledRule {
                regex: validate_regex(&context, &rule.pattern)?,
                domain: catalog.canonical(&rule.domain, &context)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Method;
    use serde_json::json;

    const CONFIG: &str = r#"
fallback_domain = "other"

[[domains]]
name = "load_balancer"

[[domains]]
name = "dns"

[[domains]]
name = "security"

[[domains]]
name = "networking"

[[domains]]
name = "other"

[[aliases]]
deprecated = "waf"
successor = "security"

[[rules.overrides]]
path = "/api/config/namespaces/{ns}/http_loadbalancers/{name}/dns_info"
domain = "load_balancer"

[[rules.overrides]]
schema = "SharedSecret"
domain = "waf"

[[rules.filename]]
pattern = "http_loadbalancer"
domain = "load_balancer"

[[rules.filename]]
pattern = "app_firewall"
domain = "waf"

[[rules.path]]
pattern = "/dns_zones"
domain = "dns"

[[rules.keywords]]
domain = "security"
keywords = ["firewall", "attack"]

[[rules.keywords]]
domain = "networking"
keywords = ["network", "attack"]
"#;

    fn classifier() -> Classifier {
        let config = BundlerConfig::from_toml_str(CONFIG).unwrap();
        let catalog = DomainCatalog::from_config(&config).unwrap();
        Classifier::new(&config, catalog).unwrap()
    }

    fn doc(id: &str) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn entry(url: &str, summary: &str) -> PathEntry {
        let mut entry = PathEntry::new(url);
        entry
            .operations
            .insert(Method::Get, json!({"summary": summary}));
        entry
    }

    #[test]
    fn test_override_beats_every_other_layer() {
        let c = classifier();
        let url = "/api/config/namespaces/{ns}/http_loadbalancers/{name}/dns_info";
        let result = c.classify_path(&entry(url, "firewall firewall"), &doc("dns_zone.json"));
        assert_eq!(result.domain, "load_balancer");
        assert_eq!(result.layer, RuleLayer::Override);
    }

    #[test]
    fn test_in_document_override_after_table() {
        let c = classifier();
        let mut e = entry("/api/anything", "");
        e.overrides.push("waf".to_string());
        let result = c.classify_path(&e, &doc("x.json"));
        assert_eq!(result.domain, "security");
        assert_eq!(result.layer, RuleLayer::Override);
        assert_eq!(result.rule_index, 1);
    }

    #[test]
    fn test_unknown_in_document_override_is_ignored() {
        let c = classifier();
        let mut e = entry("/api/config/namespaces/{ns}/dns_zones", "");
        e.overrides.push("ghost".to_string());
        assert_eq!(c.classify_path(&e, &doc("x.json")).domain, "dns");
    }

    #[test]
    fn test_filename_before_path_pattern() {
        let c = classifier();
        let result = c.classify_path(
            &entry("/api/config/namespaces/{ns}/dns_zones", ""),
            &doc("ves.io.schema.views.http_loadbalancer.json"),
        );
        assert_eq!(result.domain, "load_balancer");
        assert_eq!(result.layer, RuleLayer::Filename);
    }

    #[test]
    fn test_filename_match_is_case_insensitive_and_aliased() {
        let c = classifier();
        let result = c.classify_path(&entry("/x", ""), &doc("App_Firewall.json"));
        assert_eq!(result.domain, "security");
    }

    #[test]
    fn test_path_pattern_regardless_of_filename() {
        let c = classifier();
        let result = c.classify_path(
            &entry("/api/config/namespaces/{ns}/dns_zones", ""),
            &doc("misc.json"),
        );
        assert_eq!(result.domain, "dns");
        assert_eq!(result.layer, RuleLayer::PathPattern);
    }

    #[test]
    fn test_keyword_frequency_wins() {
        let c = classifier();
        let result = c.classify_path(
            &entry("/x", "Network network attack"),
            &doc("misc.json"),
        );
        assert_eq!(result.domain, "networking");
        assert!(result.tied_with.is_empty());
    }

    #[test]
    fn test_keyword_tie_goes_to_first_declared_domain() {
        let c = classifier();
        let result = c.classify_path(&entry("/x", "attack"), &doc("misc.json"));
        assert_eq!(result.domain, "security");
        assert_eq!(result.layer, RuleLayer::Keyword);
        assert_eq!(result.tied_with, vec!["networking".to_string()]);
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let c = classifier();
        let result = c.classify_path(&entry("/x", "nothing here"), &doc("misc.json"));
        assert_eq!(result.domain, "other");
        assert_eq!(result.layer, RuleLayer::Fallback);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let c = classifier();
        let e = entry("/x", "firewall network");
        let d = doc("misc.json");
        assert_eq!(c.classify_path(&e, &d), c.classify_path(&e, &d));
    }

    #[test]
    fn test_schema_override_and_keywords() {
        let c = classifier();
        let d = doc("misc.json");
        let result = c.classify_schema("SharedSecret", &json!({}), &d);
        assert_eq!(result.domain, "security");

        let result = c.classify_schema(
            "Peer",
            &json!({"description": "BGP network peer"}),
            &d,
        );
        assert_eq!(result.domain, "networking");

        let result = c.classify_schema("Blob", &json!({"type": "string"}), &d);
        assert_eq!(result.layer, RuleLayer::Fallback);
    }

    #[test]
    fn test_precedence_orders_layers() {
        let c = classifier();
        let strong = Classification::new("dns", RuleLayer::Override, 3);
        let weak = Classification::new("load_balancer", RuleLayer::Filename, 0);
        assert!(strong.precedence(c.catalog()) < weak.precedence(c.catalog()));
    }
}
