//! Payload types shared by the `TaskQueue` and `ResultQueue`.

use serde::{Deserialize, Serialize};

use crate::siteurl::SiteUrl;

/// Number of visits the revisit estimator averages over before it fires
/// (§4.2.1).
pub const REVISIT_SAMPLES: i32 = 5;

/// A scheduled crawl of one directory on one site.
///
/// Invariant: a given `(site_id, url)` pair appears at most once in the
/// `TaskQueue` at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlTask {
    pub site_id: String,
    pub url: SiteUrl,
    pub revisit_wait_secs: u64,
    /// `-1` means never visited.
    pub revisit_count: i32,
    pub change_count: u32,
}

impl CrawlTask {
    #[must_use]
    pub fn new_root(site_id: String, url: SiteUrl, default_revisit_wait: u64) -> Self {
        Self {
            site_id,
            url,
            revisit_wait_secs: default_revisit_wait,
            revisit_count: -1,
            change_count: 0,
        }
    }

    #[must_use]
    pub fn new_child(site_id: String, url: SiteUrl, default_revisit_wait: u64) -> Self {
        Self::new_root(site_id, url, default_revisit_wait)
    }
}

/// One entry discovered while listing a directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlEntry {
    pub is_dir: bool,
    pub url: SiteUrl,
    pub content_text: Option<String>,
}

/// The outcome of executing one `CrawlTask`.
///
/// `found == false` means the directory no longer exists (HTTP 404, FTP CWD
/// failure against an existing parent); this triggers subtree removal
/// during index processing rather than being treated as an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlResult {
    pub task: CrawlTask,
    pub found: bool,
    /// Ordered mapping, name -> entry, in the handler's native listing order.
    pub entries: Vec<(String, CrawlEntry)>,
}

impl CrawlResult {
    #[must_use]
    pub fn not_found(task: CrawlTask) -> Self {
        Self {
            task,
            found: false,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn found(task: CrawlTask) -> Self {
        Self {
            task,
            found: true,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: String, entry: CrawlEntry) {
        self.entries.push((name, entry));
    }
}
