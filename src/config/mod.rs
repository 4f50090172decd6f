//! Crawler-wide configuration: the typestate builder and its product type.

mod builder;
mod types;

pub use builder::{CrawlerConfigBuilder, NeedsSpoolDir, Ready};
pub use types::CrawlerConfig;
