use crate::config::toml_config::BundlerConfig;
use crate::core::aggregator::MasterAggregator;
use crate::core::catalog::DomainCatalog;
use crate::core::classifier::Classifier;
use crate::core::document::DocumentTemplate;
use crate::core::merger::BundleMerger;
use crate::core::resolver::ReferenceResolver;
use crate::core::{Pipeline, Publisher, Storage};
use crate::domain::model::{BundleOutput, SourceDocument};
use crate::domain::report::RunReport;
use crate::utils::error::{BundleError, Result};

const SOURCE_EXTENSION: &str = "json";

/// Reads every source document, rebuilds all bundles from scratch and hands
/// the finished set to the publisher.
pub struct BundlePipeline<S: Storage, P: Publisher> {
    pub(crate) storage: S,
    pub(crate) publisher: P,
    config: BundlerConfig,
    resolver: ReferenceResolver,
    classifier: Classifier,
    template: DocumentTemplate,
}

impl<S: Storage, P: Publisher> BundlePipeline<S, P> {
    pub fn new(storage: S, publisher: P, config: BundlerConfig, version: &str) -> Result<Self> {
        let catalog = DomainCatalog::from_config(&config)?;
        let classifier = Classifier::new(&config, catalog)?;
        let resolver = ReferenceResolver::new(&config)?;
        let template = DocumentTemplate::new(&config, version);

        Ok(Self {
            storage,
            publisher,
            config,
            resolver,
            classifier,
            template,
        })
    }

    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }

    async fn read_document(&self, name: &str) -> Result<SourceDocument> {
        let bytes = self.storage.read_file(name).await?;
        SourceDocument::from_slice(name, &bytes)
    }
}

#[async_trait::async_trait]
impl<S: Storage, P: Publisher> Pipeline for BundlePipeline<S, P> {
    async fn extract(&self, report: &mut RunReport) -> Result<Vec<SourceDocument>> {
        let names = self.storage.list_files(SOURCE_EXTENSION).await?;
        tracing::debug!("Found {} candidate files in {}", names.len(), self.storage.location());

        let mut documents = Vec::with_capacity(names.len());
        for name in names {
            match self.read_document(&name).await {
                Ok(document) => documents.push(document),
                Err(e) if self.config.processing.continue_on_error => {
                    report.record_skipped_document(&name, &e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        report.documents_loaded = documents.len();
        if documents.is_empty() {
            return Err(BundleError::NoInputDocumentsError {
                path: self.storage.location(),
            });
        }
        Ok(documents)
    }

    async fn transform(
        &self,
        documents: Vec<SourceDocument>,
        report: &mut RunReport,
    ) -> Result<BundleOutput> {
        let documents: Vec<SourceDocument> = documents
            .into_iter()
            .map(|document| self.resolver.resolve(document, report))
            .collect();
        tracing::debug!(
            "Resolved references: {} rewritten, {} dropped",
            report.refs_rewritten.len(),
            report.refs_dropped.len()
        );

        let merger = BundleMerger::new(&self.config, &self.classifier, &self.template)?;
        let bundles = merger.merge(&documents, report)?;

        let aggregator =
            MasterAggregator::new(&self.config, self.classifier.catalog(), &self.template);
        let (master, index) = aggregator.aggregate(&bundles)?;

        Ok(BundleOutput {
            bundles,
            master,
            index,
        })
    }

    async fn load(&self, output: BundleOutput, _report: &mut RunReport) -> Result<String> {
        let artifacts = output.artifacts(self.config.output.json_indent)?;
        self.publisher.publish(artifacts).await
    }
}
