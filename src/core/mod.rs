pub mod aggregator;
pub mod catalog;
pub mod classifier;
pub mod document;
pub mod etl;
pub mod merger;
pub mod refs;
pub mod resolver;

pub use crate::domain::ports::{Pipeline, Publisher, Storage};
pub use crate::utils::error::Result;
