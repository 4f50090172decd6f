//! Type-safe builder for [`CrawlerConfig`] using the typestate pattern,
//! in the same style as the teacher's `CrawlConfigBuilder`: a required field
//! (`spool_dir`) is type-state-gated, optional fields carry defaults, and
//! cross-field validation (duplicate site URLs, non-positive waits) runs
//! once at `build()`.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::site::SiteConfig;
use crate::siteurl::SiteUrl;

use super::types::CrawlerConfig;

pub struct NeedsSpoolDir;
pub struct Ready;

pub struct CrawlerConfigBuilder<State = NeedsSpoolDir> {
    spool_dir: Option<PathBuf>,
    index_dir: Option<PathBuf>,
    num_crawlers: usize,
    request_timeout: Duration,
    poll_interval: Duration,
    sites: Vec<SiteConfig>,
    _phantom: PhantomData<State>,
}

impl Default for CrawlerConfigBuilder<NeedsSpoolDir> {
    fn default() -> Self {
        Self {
            spool_dir: None,
            index_dir: None,
            num_crawlers: 4,
            request_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            sites: Vec::new(),
            _phantom: PhantomData,
        }
    }
}

impl CrawlerConfigBuilder<NeedsSpoolDir> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the spool directory. Required; satisfying this transitions the
    /// builder to a state where `build()` becomes available.
    #[must_use]
    pub fn spool_dir(self, dir: impl AsRef<Path>) -> CrawlerConfigBuilder<Ready> {
        CrawlerConfigBuilder {
            spool_dir: Some(dir.as_ref().to_path_buf()),
            index_dir: self.index_dir,
            num_crawlers: self.num_crawlers,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            sites: self.sites,
            _phantom: PhantomData,
        }
    }
}

impl<State> CrawlerConfigBuilder<State> {
    #[must_use]
    pub fn index_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.index_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn num_crawlers(mut self, n: usize) -> Self {
        self.num_crawlers = n;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    #[must_use]
    pub fn site(mut self, site: SiteConfig) -> Self {
        self.sites.push(site);
        self
    }

    /// Convenience for the common case: add a site from its root URL with
    /// default politeness parameters.
    pub fn site_url(self, root_url: &str) -> Result<Self> {
        let url = SiteUrl::parse(root_url).map_err(|e| anyhow!("invalid site URL: {e}"))?;
        Ok(self.site(SiteConfig::new(url)))
    }
}

impl CrawlerConfigBuilder<Ready> {
    /// Validate and construct the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no sites are configured, if two sites share the
    /// same identity (same canonical root URL), or if any wait parameter is
    /// non-positive.
    pub fn build(self) -> Result<CrawlerConfig> {
        let spool_dir = self
            .spool_dir
            .ok_or_else(|| anyhow!("spool_dir is required"))?;

        if self.sites.is_empty() {
            return Err(anyhow!("at least one site must be configured"));
        }

        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.clone()) {
                return Err(anyhow!(
                    "duplicate site URL (same canonical root): {}",
                    site.root_url
                ));
            }
            for (name, value) in [
                ("request_wait", site.request_wait),
                ("error_dir_wait", site.error_dir_wait),
                ("error_site_wait", site.error_site_wait),
                ("default_revisit_wait", site.default_revisit_wait),
                ("min_revisit_wait", site.min_revisit_wait),
                ("max_revisit_wait", site.max_revisit_wait),
            ] {
                if value == 0 {
                    return Err(anyhow!("site {} has non-positive {name}", site.id));
                }
            }
            if site.min_revisit_wait > site.max_revisit_wait {
                return Err(anyhow!(
                    "site {} has min_revisit_wait > max_revisit_wait",
                    site.id
                ));
            }
        }

        let index_dir = self
            .index_dir
            .unwrap_or_else(|| spool_dir.join("..").join("database").join("index"));

        Ok(CrawlerConfig {
            spool_dir,
            index_dir,
            num_crawlers: self.num_crawlers,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            sites: self.sites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_at_least_one_site() {
        let result = CrawlerConfigBuilder::new().spool_dir("/tmp/arachne-spool").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_duplicate_sites() {
        let result = CrawlerConfigBuilder::new()
            .spool_dir("/tmp/arachne-spool")
            .site_url("ftp://host/")
            .unwrap()
            .site_url("ftp://host/")
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_with_one_site() {
        let config = CrawlerConfigBuilder::new()
            .spool_dir("/tmp/arachne-spool")
            .site_url("ftp://host/")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.sites().len(), 1);
        assert_eq!(config.num_crawlers(), 4);
    }
}
