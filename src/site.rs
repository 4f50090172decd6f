//! Site identity and per-site politeness configuration.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::siteurl::SiteUrl;

/// Stable identity for a configured site: a 40-hex digest over the canonical
/// root URL string. Survives reordering of configuration and restarts.
pub fn site_id(root_url: &SiteUrl) -> String {
    let digest = Sha256::digest(root_url.root_url_string().as_bytes());
    hex::encode(digest)[..40].to_string()
}

/// Per-site politeness parameters and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub root_url: SiteUrl,
    /// Overrides scheme-based handler selection when set.
    pub handler: Option<String>,
    pub request_wait: u64,
    pub error_dir_wait: u64,
    pub error_site_wait: u64,
    pub default_revisit_wait: u64,
    pub min_revisit_wait: u64,
    pub max_revisit_wait: u64,
    pub max_depth: Option<u32>,
}

impl SiteConfig {
    #[must_use]
    pub fn new(root_url: SiteUrl) -> Self {
        let id = site_id(&root_url);
        Self {
            id,
            root_url,
            handler: None,
            request_wait: 60,
            error_dir_wait: 3600,
            error_site_wait: 3600,
            default_revisit_wait: 86_400,
            min_revisit_wait: 3600,
            max_revisit_wait: 30 * 86_400,
            max_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_id_is_stable_and_40_hex() {
        let url = SiteUrl::parse("ftp://host.example/").unwrap();
        let a = site_id(&url);
        let b = site_id(&url);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn site_id_is_independent_of_config_order() {
        let url1 = SiteUrl::parse("ftp://host.example/").unwrap();
        let url2 = SiteUrl::parse("ftp://host.example/").unwrap();
        assert_eq!(site_id(&url1), site_id(&url2));
    }

    #[test]
    fn different_roots_differ() {
        let a = SiteUrl::parse("ftp://host-a.example/").unwrap();
        let b = SiteUrl::parse("ftp://host-b.example/").unwrap();
        assert_ne!(site_id(&a), site_id(&b));
    }
}
