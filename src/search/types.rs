//! Shared types for the search API (§4.8, §6).

use serde::{Deserialize, Serialize};

/// One hit returned by [`crate::search::Searcher::search`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResultItem {
    pub url: String,
    pub is_dir: bool,
}

/// One entry returned by [`crate::search::Searcher::get_sites`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteSummary {
    pub id: String,
    pub url: String,
}

/// Restricts a search to files, directories, or either (`SEARCH_ALL` /
/// `SEARCH_FILE` / `SEARCH_DIRECTORY` in the original).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filetype {
    #[default]
    All,
    File,
    Directory,
}
