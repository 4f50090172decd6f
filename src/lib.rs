//! A site crawler/indexer core: polls configured sites for directory
//! listings over FTP, HTTP autoindex, and local filesystem sources,
//! maintaining a full-text index over the resulting tree and a read-only
//! query surface over it.

pub mod config;
pub mod crawl_engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod queue;
pub mod search;
pub mod site;
pub mod siteurl;
pub mod supervisor;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use error::{CrawlCoreError, CrawlCoreResult};
pub use search::{Filetype, SearchResultItem, Searcher, SiteSummary};
pub use site::SiteConfig;
pub use siteurl::SiteUrl;
pub use supervisor::Supervisor;
