use crate::domain::model::{Artifact, BundleOutput, SourceDocument};
use crate::domain::report::RunReport;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read side: where the source documents live.
pub trait Storage: Send + Sync {
    /// Human-readable location, used in error messages.
    fn location(&self) -> String;

    /// File names with the given extension, sorted.
    fn list_files(
        &self,
        extension: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Write side: replaces the published output as a whole or not at all.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        artifacts: Vec<Artifact>,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, report: &mut RunReport) -> Result<Vec<SourceDocument>>;
    async fn transform(
        &self,
        documents: Vec<SourceDocument>,
        report: &mut RunReport,
    ) -> Result<BundleOutput>;
    async fn load(&self, output: BundleOutput, report: &mut RunReport) -> Result<String>;
}
