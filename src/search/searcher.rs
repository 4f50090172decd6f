//! Read-only query surface over the index (§4.8), grounded on
//! `searcher.py::IndexSearcher`. Opens its own [`tantivy::IndexReader`]; the
//! index processor alone holds the writer (§9 single-writer index note).

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, TantivyDocument, Term};

use crate::index::engine::IndexEngine;
use crate::index::error::IndexResult;
use crate::index::schema::IndexSchema;

use super::query::build_query;
use super::types::{Filetype, SearchResultItem, SiteSummary};

pub struct Searcher {
    index: Index,
    schema: IndexSchema,
    reader: IndexReader,
}

impl Searcher {
    /// Open an independent reader against the same on-disk index the
    /// processor writes to, given a clone of its tantivy `Index` handle
    /// (`Index` is internally `Arc`-backed, so this is cheap) and schema.
    pub fn open(index: Index, schema: IndexSchema) -> IndexResult<Self> {
        let reader = index.reader()?;
        Ok(Self { index, schema, reader })
    }

    /// Convenience constructor against a live `IndexEngine` (same-process
    /// reader opened alongside the writer).
    pub fn new(engine: &IndexEngine) -> IndexResult<Self> {
        Self::open(engine.index_handle(), engine.schema().clone())
    }

    /// `search(query, offset, count, check_at_least, site_ids, filetype)`
    /// (§4.8, §6). `check_at_least` is accepted for interface parity with
    /// the original's `Enquire::get_mset`; tantivy's `Count` collector
    /// always returns an exact match count, so there is no approximation to
    /// tune here.
    pub fn search(
        &self,
        query: &str,
        offset: usize,
        count: usize,
        _check_at_least: usize,
        site_ids: &[String],
        filetype: Filetype,
    ) -> IndexResult<(usize, Vec<SearchResultItem>)> {
        let searcher = self.reader.searcher();
        let query = build_query(&self.index, &self.schema, query, site_ids, filetype)?;

        let estimated_total = searcher.search(&*query, &tantivy::collector::Count)?;
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(count).and_offset(offset))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let url = doc
                .get_first(self.schema.full_url)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let is_dir = doc
                .get_first(self.schema.is_dir)
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                == 1;
            results.push(SearchResultItem { url, is_dir });
        }

        Ok((estimated_total, results))
    }

    /// `get_sites()`: every document carrying `R`+`1` (§3, §4.8).
    pub fn get_sites(&self) -> IndexResult<Vec<SiteSummary>> {
        let searcher = self.reader.searcher();
        let root_term = Term::from_field_u64(self.schema.is_root, 1);
        let query: Box<dyn Query> = Box::new(BooleanQuery::new(vec![(
            Occur::Must,
            Box::new(TermQuery::new(root_term, IndexRecordOption::Basic)) as Box<dyn Query>,
        )]));

        let top_docs = searcher.search(&*query, &TopDocs::with_limit(usize::MAX))?;
        let mut sites = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let id = doc
                .get_first(self.schema.site_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let url = doc
                .get_first(self.schema.full_url)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            sites.push(SiteSummary { id, url });
        }
        Ok(sites)
    }
}
