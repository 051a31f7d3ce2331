pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{AtomicDirectoryPublisher, LocalStorage};
pub use app::pipelines::BundlePipeline;
pub use config::BundlerConfig;
pub use core::etl::BundleEngine;
pub use domain::report::RunReport;
pub use utils::error::{BundleError, Result};
