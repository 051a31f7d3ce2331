use crate::domain::model::BundleOutput;
use crate::domain::ports::Pipeline;
use crate::domain::report::RunReport;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs a pipeline stage by stage. Nothing is published unless every stage
/// before `load` succeeded.
pub struct BundleEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> BundleEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor),
        }
    }

    pub async fn run(&self, report: &mut RunReport) -> Result<String> {
        let output = self.build(report).await?;

        tracing::info!("Publishing {} domain bundles...", output.bundles.len());
        let location = self.pipeline.load(output, report).await?;
        self.monitor.log_stats("load");
        tracing::info!("Output published to: {}", location);

        self.monitor.log_final_stats();
        Ok(location)
    }

    /// Extract and transform only; the output stays in memory.
    pub async fn dry_run(&self, report: &mut RunReport) -> Result<BundleOutput> {
        let output = self.build(report).await?;
        self.monitor.log_final_stats();
        Ok(output)
    }

    async fn build(&self, report: &mut RunReport) -> Result<BundleOutput> {
        tracing::info!("Starting bundle run...");
        self.monitor.log_stats("start");

        tracing::info!("Reading source documents...");
        let documents = self.pipeline.extract(report).await?;
        tracing::info!("Read {} source documents", documents.len());
        self.monitor.log_stats("extract");

        tracing::info!("Resolving, classifying and merging...");
        let output = self.pipeline.transform(documents, report).await?;
        tracing::info!(
            "Built {} bundles, master and index",
            output.bundles.len()
        );
        self.monitor.log_stats("transform");

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DomainBundle, SourceDocument};
    use crate::utils::error::BundleError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPipeline {
        fail_transform: bool,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl Pipeline for StubPipeline {
        async fn extract(&self, report: &mut RunReport) -> Result<Vec<SourceDocument>> {
            report.documents_loaded = 1;
            Ok(vec![SourceDocument {
                id: "a.json".to_string(),
                ..Default::default()
            }])
        }

        async fn transform(
            &self,
            _documents: Vec<SourceDocument>,
            _report: &mut RunReport,
        ) -> Result<BundleOutput> {
            if self.fail_transform {
                return Err(BundleError::SchemaConflictError {
                    section: "schemas".to_string(),
                    name: "A".to_string(),
                    first: "x".to_string(),
                    second: "y".to_string(),
                });
            }
            Ok(BundleOutput {
                bundles: vec![DomainBundle {
                    domain: "other".to_string(),
                    paths: BTreeMap::new(),
                    components: BTreeMap::new(),
                    tags: Vec::new(),
                    document: json!({}),
                }],
                master: json!({}),
                index: json!({}),
            })
        }

        async fn load(&self, _output: BundleOutput, _report: &mut RunReport) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok("out".to_string())
        }
    }

    fn stub(fail_transform: bool) -> StubPipeline {
        StubPipeline {
            fail_transform,
            loads: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_run_publishes_after_transform() {
        let engine = BundleEngine::new(stub(false));
        let mut report = RunReport::new();
        assert_eq!(engine.run(&mut report).await.unwrap(), "out");
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 1);
        assert_eq!(report.documents_loaded, 1);
    }

    #[tokio::test]
    async fn test_failed_transform_never_loads() {
        let engine = BundleEngine::new_with_monitoring(stub(true), false);
        let mut report = RunReport::new();
        assert!(engine.run(&mut report).await.is_err());
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_skips_load() {
        let engine = BundleEngine::new(stub(false));
        let mut report = RunReport::new();
        let output = engine.dry_run(&mut report).await.unwrap();
        assert_eq!(output.bundles.len(), 1);
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 0);
    }
}
