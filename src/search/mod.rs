//! Read-only search API over the crawl index (§4.8), distinct from the
//! write-side [`crate::index`] module: the processor owns the writer, this
//! module only ever opens a reader (§9 single-writer index note).

mod query;
mod searcher;
mod types;

pub use searcher::Searcher;
pub use types::{Filetype, SearchResultItem, SiteSummary};
