pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub use toml_config::BundlerConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "spec-bundler")]
#[command(about = "Regroups OpenAPI documents into self-contained domain bundles")]
pub struct CliConfig {
    #[arg(long, short = 'c', default_value = "config/bundler.toml")]
    pub config: String,

    #[arg(long, help = "Directory holding the source documents")]
    pub input_dir: Option<String>,

    #[arg(long, help = "Directory that receives the bundles")]
    pub output_dir: Option<String>,

    #[arg(long, help = "Where to write the JSON run report")]
    pub report: Option<String>,

    #[arg(long, help = "Version label written into every document")]
    pub spec_version: Option<String>,

    #[arg(long, default_value = ".version")]
    pub version_file: String,

    #[arg(long, help = "Build everything but publish nothing")]
    pub dry_run: bool,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Command-line paths take precedence over the file.
    pub fn apply_overrides(&self, config: &mut BundlerConfig) {
        if let Some(input_dir) = &self.input_dir {
            config.paths.input_dir = input_dir.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.paths.output_dir = output_dir.clone();
        }
        if let Some(report) = &self.report {
            config.paths.report_path = Some(report.clone());
        }
    }

    /// `--spec-version`, else the version file, else today's UTC date.
    pub fn resolve_version(&self) -> String {
        if let Some(version) = self.spec_version.as_deref().map(str::trim) {
            if !version.is_empty() {
                return version.to_string();
            }
        }
        if let Ok(contents) = std::fs::read_to_string(&self.version_file) {
            let version = contents.trim();
            if !version.is_empty() {
                return version.to_string();
            }
        }
        chrono::Utc::now().format("%Y.%m.%d").to_string()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("config", &self.config)?;
        if let Some(input_dir) = &self.input_dir {
            validation::validate_path("input_dir", input_dir)?;
        }
        if let Some(output_dir) = &self.output_dir {
            validation::validate_path("output_dir", output_dir)?;
        }
        if let Some(report) = &self.report {
            validation::validate_path("report", report)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["spec-bundler"];
        argv.extend_from_slice(args);
        CliConfig::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.config, "config/bundler.toml");
        assert!(!cli.dry_run);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_overrides_replace_paths() {
        let cli = parse(&["--input-dir", "in", "--output-dir", "out", "--report", "r.json"]);
        let mut config = BundlerConfig::from_toml_str(
            "fallback_domain = \"other\"\n[[domains]]\nname = \"other\"\n",
        )
        .unwrap();
        cli.apply_overrides(&mut config);
        assert_eq!(config.paths.input_dir, "in");
        assert_eq!(config.paths.output_dir, "out");
        assert_eq!(config.paths.report_path.as_deref(), Some("r.json"));
    }

    #[test]
    fn test_version_precedence() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"2.4.1\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = parse(&["--spec-version", "9.9.9", "--version-file", &path]);
        assert_eq!(cli.resolve_version(), "9.9.9");

        let cli = parse(&["--version-file", &path]);
        assert_eq!(cli.resolve_version(), "2.4.1");

        let cli = parse(&["--version-file", "/nonexistent/.version"]);
        let version = cli.resolve_version();
        assert_eq!(version.len(), 10);
        assert_eq!(version.matches('.').count(), 2);
    }
}
