use anyhow::Context;
use clap::Parser;
use spec_bundler::domain::model::BundleOutput;
use spec_bundler::utils::json::to_canonical_bytes;
use spec_bundler::utils::{logger, validation::Validate};
use spec_bundler::{
    AtomicDirectoryPublisher, BundleEngine, BundlePipeline, BundlerConfig, CliConfig,
    LocalStorage, RunReport,
};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting spec-bundler");
    tracing::info!("Loading configuration from: {}", cli.config);

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    let mut config = match BundlerConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    let version = cli.resolve_version();
    display_config_summary(&config, &version, &cli);

    if cli.monitor {
        tracing::info!("System monitoring enabled");
    }

    let storage = LocalStorage::new(&config.paths.input_dir);
    let publisher = AtomicDirectoryPublisher::new(&config.paths.output_dir);
    let report_path = config.paths.report_path.clone();
    let pipeline = BundlePipeline::new(storage, publisher, config, &version)
        .context("failed to build the bundle pipeline")?;
    let engine = BundleEngine::new_with_monitoring(pipeline, cli.monitor);

    let mut report = RunReport::new();
    let outcome = if cli.dry_run {
        tracing::info!("DRY RUN MODE - nothing will be published");
        engine.dry_run(&mut report).await.map(|output| {
            describe_dry_run(&output);
            String::new()
        })
    } else {
        engine.run(&mut report).await
    };

    tracing::info!("Run summary:");
    report.log_summary();
    if let Some(path) = &report_path {
        write_report(Path::new(path), &report)
            .with_context(|| format!("failed to write run report to {}", path))?;
        tracing::info!("Run report written to: {}", path);
    }

    match outcome {
        Ok(location) if !location.is_empty() => {
            println!("✅ Bundles published to: {}", location);
        }
        Ok(_) => {
            println!("✅ Dry run completed; nothing was published");
        }
        Err(e) => {
            tracing::error!(
                "Bundle run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }

    Ok(())
}

fn display_config_summary(config: &BundlerConfig, version: &str, cli: &CliConfig) {
    tracing::info!("Configuration summary:");
    tracing::info!("  Pipeline: {}", config.pipeline.name);
    tracing::info!("  Input: {}", config.paths.input_dir);
    tracing::info!("  Output: {}", config.paths.output_dir);
    tracing::info!("  Version: {}", version);
    tracing::info!(
        "  Domains: {} (fallback '{}', {} aliases)",
        config.domains.len(),
        config.fallback_domain,
        config.aliases.len()
    );
    tracing::info!(
        "  Rules: {} overrides, {} filename, {} path, {} keyword",
        config.rules.overrides.len(),
        config.rules.filename.len(),
        config.rules.path.len(),
        config.rules.keywords.len()
    );
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }
}

fn describe_dry_run(output: &BundleOutput) {
    for bundle in &output.bundles {
        tracing::info!(
            "  would write {} ({} paths, {} schemas)",
            bundle.file_name(),
            bundle.path_count(),
            bundle.schema_count()
        );
    }
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_canonical_bytes(&report.to_json(), 2)?)?;
    Ok(())
}
