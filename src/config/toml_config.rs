use crate::core::catalog::DomainCatalog;
use crate::core::classifier::Classifier;
use crate::utils::error::{BundleError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Domain that receives anything no rule claims.
    pub fallback_domain: String,
    #[serde(default)]
    pub pipeline: PipelineInfo,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub complexity: ComplexityConfig,
    pub domains: Vec<DomainDefinition>,
    #[serde(default)]
    pub aliases: Vec<AliasDefinition>,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: String,
}

impl Default for PipelineInfo {
    fn default() -> Self {
        Self {
            name: "spec-bundler".to_string(),
            description: "Domain bundles for API documentation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub report_path: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: "specs/original".to_string(),
            output_dir: "docs/specifications/api".to_string(),
            report_path: Some("reports/pipeline-report.json".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_indent: usize,
    pub openapi_version: String,
    /// Prepended to derived bundle titles, e.g. "Acme" -> "Acme Load Balancer API".
    pub title_prefix: String,
    pub master_title: String,
    pub master_description: String,
    /// `info` extension naming the bundle's domain.
    pub domain_extension: String,
    pub contact: Option<ContactInfo>,
    pub license: Option<LicenseInfo>,
    pub servers: Vec<ServerDefinition>,
    pub security_schemes: BTreeMap<String, serde_json::Value>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let mut security_schemes = BTreeMap::new();
        security_schemes.insert(
            "ApiToken".to_string(),
            serde_json::json!({
                "type": "apiKey",
                "name": "Authorization",
                "in": "header",
                "description": "API Token authentication. Format: 'APIToken <your-token>'"
            }),
        );
        Self {
            json_indent: 2,
            openapi_version: "3.0.3".to_string(),
            title_prefix: String::new(),
            master_title: "API".to_string(),
            master_description: "Complete API specification".to_string(),
            domain_extension: "x-bundle-domain".to_string(),
            contact: None,
            license: None,
            servers: Vec::new(),
            security_schemes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVariable {
    pub default: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Skip unreadable documents instead of aborting the run.
    pub continue_on_error: bool,
    /// Bundle schemas that no path reaches, classified on their own.
    pub include_unreferenced_schemas: bool,
    pub remove_ref_siblings: bool,
    pub inline_orphan_request_bodies: bool,
    /// Regex stripped from document ids when building operationId prefixes.
    pub operation_id_prefix_strip: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            include_unreferenced_schemas: true,
            remove_ref_siblings: true,
            inline_orphan_request_bodies: true,
            operation_id_prefix_strip: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub moderate_min_paths: usize,
    pub advanced_min_paths: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            moderate_min_paths: 20,
            advanced_min_paths: 100,
        }
    }
}

impl ComplexityConfig {
    pub fn tier(&self, path_count: usize) -> &'static str {
        if path_count >= self.advanced_min_paths {
            "advanced"
        } else if path_count >= self.moderate_min_paths {
            "moderate"
        } else {
            "simple"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDefinition {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_tier")]
    pub requires_tier: String,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub related_domains: Vec<String>,
    pub cli_metadata: Option<serde_json::Value>,
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_tier() -> String {
    "Standard".to_string()
}

impl DomainDefinition {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: None,
            description: None,
            category: default_category(),
            requires_tier: default_tier(),
            is_preview: false,
            use_cases: Vec::new(),
            related_domains: Vec::new(),
            cli_metadata: None,
        }
    }

    /// "load_balancer" -> "Load Balancer".
    pub fn display_name(&self) -> String {
        self.name
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDefinition {
    pub deprecated: String,
    pub successor: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub overrides: Vec<OverrideRule>,
    pub filename: Vec<PatternRule>,
    pub path: Vec<PatternRule>,
    pub keywords: Vec<KeywordRule>,
}

/// Exactly one of `path`, `pattern` or `schema` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRule {
    pub path: Option<String>,
    pub pattern: Option<String>,
    pub schema: Option<String>,
    pub domain: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub domain: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub rewrites: Vec<RewriteRule>,
}

/// Retargets a dangling `$ref`; `replacement` may use `$1`-style captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

impl BundlerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BundleError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = validation::validate_regex("env substitution", r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn domain(&self, name: &str) -> Option<&DomainDefinition> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("paths.input_dir", &self.paths.input_dir)?;
        validation::validate_path("paths.output_dir", &self.paths.output_dir)?;
        if let Some(report) = &self.paths.report_path {
            validation::validate_path("paths.report_path", report)?;
        }

        validation::validate_range("output.json_indent", self.output.json_indent, 0, 8)?;
        validation::validate_non_empty_string("output.openapi_version", &self.output.openapi_version)?;
        validation::validate_non_empty_string(
            "output.domain_extension",
            &self.output.domain_extension,
        )?;
        if let Some(url) = self.output.contact.as_ref().and_then(|c| c.url.as_deref()) {
            validation::validate_url("output.contact.url", url)?;
        }
        if let Some(url) = self.output.license.as_ref().and_then(|l| l.url.as_deref()) {
            validation::validate_url("output.license.url", url)?;
        }

        if self.complexity.moderate_min_paths > self.complexity.advanced_min_paths {
            return Err(BundleError::ConfigValidationError {
                field: "complexity".to_string(),
                message: "moderate_min_paths must not exceed advanced_min_paths".to_string(),
            });
        }

        if self.domains.is_empty() {
            return Err(BundleError::MissingConfigError {
                field: "domains".to_string(),
            });
        }

        for (i, rule) in self.rules.overrides.iter().enumerate() {
            let set = [&rule.path, &rule.pattern, &rule.schema]
                .iter()
                .filter(|v| v.is_some())
                .count();
            if set != 1 {
                return Err(BundleError::ConfigValidationError {
                    field: format!("rules.overrides[{}]", i),
                    message: "exactly one of path, pattern or schema must be set".to_string(),
                });
            }
        }

        if let Some(strip) = &self.processing.operation_id_prefix_strip {
            validation::validate_regex("processing.operation_id_prefix_strip", strip)?;
        }

        // Domain names, aliases and every rule target are checked while
        // building the catalog and compiling the rule layers.
        let catalog = DomainCatalog::from_config(self)?;
        Classifier::new(self, catalog)?;
        crate::core::resolver::ReferenceResolver::new(self)?;

        Ok(())
    }
}

impl Validate for BundlerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
