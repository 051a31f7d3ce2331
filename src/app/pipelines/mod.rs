pub mod bundle_pipeline;

pub use bundle_pipeline::BundlePipeline;
