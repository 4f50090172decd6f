//! Crate-level error taxonomy shared across the queue/crawl/index boundary.

use thiserror::Error;

/// Top-level error type for the crawl/index core.
///
/// Individual subsystems (the queue family, the index) define their own
/// narrower error enums and convert into this one at the boundary where a
/// caller needs a single type to log and absorb.
#[derive(Debug, Error)]
pub enum CrawlCoreError {
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::error::QueueError),

    #[error("index error: {0}")]
    Index(#[from] crate::index::error::IndexError),

    #[error("site url error: {0}")]
    SiteUrl(#[from] crate::siteurl::UrlError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CrawlCoreError {
    /// Whether the failure represents a transient condition worth retrying,
    /// as opposed to a configuration or programmer error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CrawlCoreError::Queue(_) | CrawlCoreError::Database(_) | CrawlCoreError::Io(_)
        )
    }
}

pub type CrawlCoreResult<T> = Result<T, CrawlCoreError>;
