//! Crawler-wide configuration type.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::site::SiteConfig;

/// Ambient, crawler-wide configuration (as opposed to [`SiteConfig`], which
/// is per-site). Built exclusively through [`super::builder::CrawlerConfigBuilder`];
/// does not parse CLI flags or config files itself (that remains an external
/// concern), but is the typed target such a loader populates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub(crate) spool_dir: PathBuf,
    pub(crate) index_dir: PathBuf,
    pub(crate) num_crawlers: usize,
    #[serde(with = "duration_secs")]
    pub(crate) request_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub(crate) poll_interval: Duration,
    pub(crate) sites: Vec<SiteConfig>,
}

impl CrawlerConfig {
    #[must_use]
    pub fn spool_dir(&self) -> &PathBuf {
        &self.spool_dir
    }

    #[must_use]
    pub fn index_dir(&self) -> &PathBuf {
        &self.index_dir
    }

    #[must_use]
    pub fn num_crawlers(&self) -> usize {
        self.num_crawlers
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    #[must_use]
    pub fn tasks_db_path(&self) -> PathBuf {
        self.spool_dir.join("tasks.sqlite3")
    }

    #[must_use]
    pub fn results_db_path(&self) -> PathBuf {
        self.spool_dir.join("results.sqlite3")
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
