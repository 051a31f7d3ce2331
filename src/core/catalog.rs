use crate::config::toml_config::{BundlerConfig, DomainDefinition};
use crate::utils::error::{BundleError, Result};
use crate::utils::validation;
use std::collections::{BTreeMap, HashMap};

/// The closed set of domains for one run, with deprecated names folded
/// onto their successors.
#[derive(Debug, Clone)]
pub struct DomainCatalog {
    domains: Vec<DomainDefinition>,
    positions: HashMap<String, usize>,
    aliases: BTreeMap<String, String>,
    fallback: String,
}

impl DomainCatalog {
    pub fn from_config(config: &BundlerConfig) -> Result<Self> {
        let mut positions = HashMap::new();
        for (i, domain) in config.domains.iter().enumerate() {
            validation::validate_identifier(&format!("domains[{}].name", i), &domain.name)?;
            if positions.insert(domain.name.clone(), i).is_some() {
                return Err(BundleError::InvalidConfigValueError {
                    field: format!("domains[{}].name", i),
                    value: domain.name.clone(),
                    reason: "Duplicate domain name".to_string(),
                });
            }
        }

        let mut direct = BTreeMap::new();
        for (i, alias) in config.aliases.iter().enumerate() {
            let field = format!("aliases[{}]", i);
            if positions.contains_key(&alias.deprecated) {
                return Err(BundleError::ConfigValidationError {
                    field,
                    message: format!(
                        "deprecated name '{}' is still declared as a domain",
                        alias.deprecated
                    ),
                });
            }
            if direct
                .insert(alias.deprecated.clone(), alias.successor.clone())
                .is_some()
            {
                return Err(BundleError::ConfigValidationError {
                    field,
                    message: format!("'{}' is deprecated more than once", alias.deprecated),
                });
            }
        }

        // Follow chains (a -> b -> c) so every alias points at a live domain.
        let mut aliases = BTreeMap::new();
        for deprecated in direct.keys() {
            let mut current = deprecated.as_str();
            let mut hops = 0;
            while let Some(next) = direct.get(current) {
                current = next.as_str();
                hops += 1;
                if hops > direct.len() {
                    return Err(BundleError::ConfigValidationError {
                        field: "aliases".to_string(),
                        message: format!("alias cycle through '{}'", deprecated),
                    });
                }
            }
            if !positions.contains_key(current) {
                return Err(BundleError::UnknownDomainError {
                    context: format!("alias '{}'", deprecated),
                    domain: current.to_string(),
                });
            }
            aliases.insert(deprecated.clone(), current.to_string());
        }

        let mut catalog = Self {
            domains: config.domains.clone(),
            positions,
            aliases,
            fallback: String::new(),
        };
        catalog.fallback = catalog.canonical(&config.fallback_domain, "fallback_domain")?;

        for (i, domain) in config.domains.iter().enumerate() {
            for (j, related) in domain.related_domains.iter().enumerate() {
                catalog.canonical(related, &format!("domains[{}].related_domains[{}]", i, j))?;
            }
        }

        Ok(catalog)
    }

    /// Resolves `name` through the alias table; unknown names are a configuration error.
    pub fn canonical(&self, name: &str, context: &str) -> Result<String> {
        self.lookup(name).ok_or_else(|| BundleError::UnknownDomainError {
            context: context.to_string(),
            domain: name.to_string(),
        })
    }

    pub fn lookup(&self, name: &str) -> Option<String> {
        if self.positions.contains_key(name) {
            return Some(name.to_string());
        }
        self.aliases.get(name).cloned()
    }

    pub fn position(&self, name: &str) -> usize {
        self.positions.get(name).copied().unwrap_or(usize::MAX)
    }

    pub fn definition(&self, name: &str) -> Option<&DomainDefinition> {
        self.positions.get(name).map(|&i| &self.domains[i])
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Related domains with aliases resolved, self-references and repeats removed.
    pub fn related_domains(&self, name: &str) -> Vec<String> {
        let mut related: Vec<String> = Vec::new();
        if let Some(definition) = self.definition(name) {
            for candidate in &definition.related_domains {
                if let Some(resolved) = self.lookup(candidate) {
                    if resolved != name && !related.contains(&resolved) {
                        related.push(resolved);
                    }
                }
            }
        }
        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::AliasDefinition;

    fn config(domains: &[&str], aliases: &[(&str, &str)], fallback: &str) -> BundlerConfig {
        let content = format!(
            "fallback_domain = \"{}\"\n{}",
            fallback,
            domains
                .iter()
                .map(|d| format!("[[domains]]\nname = \"{}\"\n", d))
                .collect::<String>()
        );
        let mut config = BundlerConfig::from_toml_str(&content).unwrap();
        config.aliases = aliases
            .iter()
            .map(|(d, s)| AliasDefinition {
                deprecated: d.to_string(),
                successor: s.to_string(),
            })
            .collect();
        config
    }

    #[test]
    fn test_alias_chain_resolves_to_live_domain() {
        let catalog = DomainCatalog::from_config(&config(
            &["waf", "other"],
            &[("app_firewall", "security"), ("security", "waf")],
            "other",
        ))
        .unwrap();
        assert_eq!(catalog.lookup("app_firewall").as_deref(), Some("waf"));
        assert_eq!(catalog.lookup("security").as_deref(), Some("waf"));
        assert_eq!(catalog.lookup("waf").as_deref(), Some("waf"));
        assert!(catalog.lookup("ghost").is_none());
    }

    #[test]
    fn test_alias_cycle_is_rejected() {
        let err = DomainCatalog::from_config(&config(
            &["other"],
            &[("a", "b"), ("b", "a")],
            "other",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_deprecated_name_cannot_stay_declared() {
        assert!(DomainCatalog::from_config(&config(
            &["dns", "other"],
            &[("dns", "other")],
            "other",
        ))
        .is_err());
    }

    #[test]
    fn test_fallback_may_be_an_alias() {
        let catalog = DomainCatalog::from_config(&config(
            &["misc"],
            &[("other", "misc")],
            "other",
        ))
        .unwrap();
        assert_eq!(catalog.fallback(), "misc");
    }

    #[test]
    fn test_unknown_fallback_is_rejected() {
        assert!(matches!(
            DomainCatalog::from_config(&config(&["dns"], &[], "other")),
            Err(BundleError::UnknownDomainError { .. })
        ));
    }

    #[test]
    fn test_declaration_order_positions() {
        let catalog =
            DomainCatalog::from_config(&config(&["b", "a", "other"], &[], "other")).unwrap();
        assert_eq!(catalog.position("b"), 0);
        assert_eq!(catalog.position("a"), 1);
        assert_eq!(catalog.position("zzz"), usize::MAX);
    }
}
