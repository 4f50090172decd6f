//! Reconciles one `CrawlResult` against the index and schedules follow-up
//! crawl work (§4.6). Runs on a single task; the `IndexEngine`'s writer is
//! never shared.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{TantivyDocument, Term};
use tracing::{error, info, warn};

use crate::queue::{CrawlResult, QueueError, ResultQueue, TaskQueue};

use super::engine::IndexEngine;
use super::error::IndexResult;

/// A pluggable hook for reading file content into search terms (§1
/// non-goal). The default returns `None` for every entry; supplying a real
/// extractor is the intended extension point the `content` field exists
/// for.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, is_dir: bool, path: &str) -> Option<String>;
}

pub struct NoopContentExtractor;

impl ContentExtractor for NoopContentExtractor {
    fn extract(&self, _is_dir: bool, _path: &str) -> Option<String> {
        None
    }
}

pub struct IndexProcessor {
    engine: IndexEngine,
    results: Arc<ResultQueue>,
    tasks: Arc<TaskQueue>,
    content_extractor: Box<dyn ContentExtractor>,
    poll_interval: Duration,
}

impl IndexProcessor {
    pub fn new(
        engine: IndexEngine,
        results: Arc<ResultQueue>,
        tasks: Arc<TaskQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            results,
            tasks,
            content_extractor: Box::new(NoopContentExtractor),
            poll_interval,
        }
    }

    pub fn with_content_extractor(mut self, extractor: Box<dyn ContentExtractor>) -> Self {
        self.content_extractor = extractor;
        self
    }

    /// Delete every indexed document whose `site_id` is not in
    /// `configured_site_ids` (startup reconciliation).
    pub fn purge_unconfigured_sites(&mut self, configured_site_ids: &[String]) -> IndexResult<()> {
        let schema = self.engine.schema().clone();
        let reader = self.engine.reader().searcher();
        let configured: HashSet<&str> = configured_site_ids.iter().map(String::as_str).collect();

        let all_query = tantivy::query::AllQuery;
        let top_docs = reader.search(&all_query, &TopDocs::with_limit(usize::MAX))?;
        let mut stale_sites = HashSet::new();
        for (_, addr) in top_docs {
            let doc: TantivyDocument = reader.doc(addr)?;
            if let Some(site_id) = doc
                .get_first(schema.site_id)
                .and_then(|v| v.as_str())
                && !configured.contains(site_id)
            {
                stale_sites.insert(site_id.to_string());
            }
        }

        for site_id in stale_sites {
            let term = Term::from_field_text(schema.site_id, &site_id);
            self.engine
                .delete_query(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))?;
        }
        self.engine.commit()
    }

    /// Drain the `ResultQueue` until empty, processing one result at a
    /// time; on empty, commit and return.
    pub async fn run_once(&mut self) -> IndexResult<bool> {
        let result = match self.results.get().await {
            Ok(result) => result,
            Err(QueueError::EmptyQueue) => {
                self.engine.commit()?;
                return Ok(false);
            }
            Err(e) => {
                error!(error = %e, "result queue error");
                return Ok(false);
            }
        };

        match self.reconcile(&result) {
            Ok((dir_changed, child_tasks)) => {
                for task in child_tasks {
                    if let Err(e) = self.tasks.put_new(&task).await {
                        warn!(error = %e, "failed to enqueue child task");
                    }
                }
                if result.found && let Err(e) = self.tasks.put_visited(result.task.clone(), dir_changed).await {
                    warn!(error = %e, "failed to schedule revisit");
                }
            }
            Err(e) => {
                error!(error = %e, site = %result.task.site_id, "failed to process result; moving to tail");
                let _ = self.results.report_error(&result).await;
                return Ok(true);
            }
        }

        let _ = self.results.report_done(&result).await;
        Ok(true)
    }

    /// Run the processor loop until `running` is cleared.
    pub async fn run(&mut self, running: Arc<std::sync::atomic::AtomicBool>) {
        use std::sync::atomic::Ordering;
        info!("index processor starting");
        while running.load(Ordering::Relaxed) {
            match self.run_once().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!(error = %e, "index processor error");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        if let Err(e) = self.engine.commit() {
            error!(error = %e, "final commit failed on shutdown");
        }
        info!("index processor stopped");
    }

    /// Apply one result to the index; returns whether anything about the
    /// directory changed and the new subdirectory tasks to enqueue. Pure
    /// index/query work, no queue I/O (the caller awaits the queue calls).
    #[allow(clippy::type_complexity)]
    fn reconcile(
        &mut self,
        result: &CrawlResult,
    ) -> IndexResult<(bool, Vec<crate::queue::CrawlTask>)> {
        let site_id = result.task.site_id.clone();
        let path = result.task.url.path();

        if !result.found {
            self.remove_subtree(&site_id, &path)?;
            self.engine.commit()?;
            return Ok((false, Vec::new()));
        }

        if result.task.url.is_root() {
            self.ensure_root_document(&site_id, &path, &result.task.url.to_string())?;
        }

        let dirname = directory_prefix(&path);
        let existing = self.existing_children(&site_id, &dirname)?;

        let incoming_names: HashSet<&str> =
            result.entries.iter().map(|(name, _)| name.as_str()).collect();

        let mut dir_changed = false;
        let mut kept: HashSet<String> = HashSet::new();

        for (basename, existing_is_dir, existing_path) in existing {
            if basename.is_empty() {
                continue; // the root-self row, never removed here
            }
            if !incoming_names.contains(basename.as_str()) {
                dir_changed = true;
                if existing_is_dir {
                    self.remove_subtree(&site_id, &existing_path)?;
                } else {
                    self.engine.delete_path(&existing_path);
                }
                continue;
            }

            let incoming_is_dir = result
                .entries
                .iter()
                .find(|(n, _)| n == &basename)
                .map(|(_, e)| e.is_dir)
                .unwrap_or(existing_is_dir);

            if incoming_is_dir == existing_is_dir {
                kept.insert(basename);
            } else {
                dir_changed = true;
                self.engine.delete_path(&existing_path);
            }
        }

        let mut child_tasks = Vec::new();
        for (name, entry) in &result.entries {
            if kept.contains(name) {
                continue;
            }
            dir_changed = true;
            let entry_path = format!("{}{name}", dirname);
            let content = self.content_extractor.extract(entry.is_dir, &entry_path);
            self.add_document(
                &site_id,
                &entry_path,
                &dirname,
                name,
                entry.is_dir,
                false,
                &entry.url.to_string(),
                content,
            )?;
            if entry.is_dir {
                child_tasks.push(crate::queue::CrawlTask::new_child(
                    site_id.clone(),
                    entry.url.clone(),
                    result.task.revisit_wait_secs,
                ));
            }
        }

        self.engine.commit()?;
        Ok((dir_changed, child_tasks))
    }

    fn ensure_root_document(&mut self, site_id: &str, path: &str, root_url: &str) -> IndexResult<()> {
        let schema = self.engine.schema().clone();
        let searcher = self.engine.reader().searcher();
        let site_term = Term::from_field_text(schema.site_id, site_id);
        let root_term = Term::from_field_text(schema.basename, "");
        let query = BooleanQuery::new(vec![
            (Occur::Must, Box::new(TermQuery::new(site_term, IndexRecordOption::Basic)) as Box<dyn Query>),
            (Occur::Must, Box::new(TermQuery::new(root_term, IndexRecordOption::Basic))),
        ]);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;
        if hits.is_empty() {
            self.add_document(site_id, path, "/", "", true, true, root_url, None)?;
        }
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn existing_children(
        &self,
        site_id: &str,
        dirname: &str,
    ) -> IndexResult<Vec<(String, bool, String)>> {
        let schema = self.engine.schema().clone();
        let searcher = self.engine.reader().searcher();
        let site_term = Term::from_field_text(schema.site_id, site_id);
        let dir_term = Term::from_field_text(schema.dirname, dirname);
        let query = BooleanQuery::new(vec![
            (Occur::Must, Box::new(TermQuery::new(site_term, IndexRecordOption::Basic)) as Box<dyn Query>),
            (Occur::Must, Box::new(TermQuery::new(dir_term, IndexRecordOption::Basic))),
        ]);
        let hits = searcher.search(&query, &TopDocs::with_limit(usize::MAX))?;
        let mut out = Vec::with_capacity(hits.len());
        for (_, addr) in hits {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let basename = doc
                .get_first(schema.basename)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let is_dir = doc
                .get_first(schema.is_dir)
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                == 1;
            let path = doc
                .get_first(schema.path)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            out.push((basename, is_dir, path));
        }
        Ok(out)
    }

    /// Delete the document at `path` and every document whose dirname
    /// begins with `path.rstrip('/') + '/'`.
    fn remove_subtree(&mut self, site_id: &str, path: &str) -> IndexResult<()> {
        let schema = self.engine.schema().clone();
        let prefix = format!("{}/", path.trim_end_matches('/'));

        self.engine.delete_path(path);

        let site_term = Term::from_field_text(schema.site_id, site_id);
        let pattern = format!("{}.*", regex::escape(&prefix));
        let regex_query = RegexQuery::from_pattern(&pattern, schema.dirname)?;
        let query = BooleanQuery::new(vec![
            (Occur::Must, Box::new(TermQuery::new(site_term, IndexRecordOption::Basic)) as Box<dyn Query>),
            (Occur::Must, Box::new(regex_query)),
        ]);
        self.engine.delete_query(Box::new(query))?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_document(
        &mut self,
        site_id: &str,
        path: &str,
        dirname: &str,
        basename: &str,
        is_dir: bool,
        is_root: bool,
        full_url: &str,
        content: Option<String>,
    ) -> IndexResult<()> {
        let schema = self.engine.schema().clone();
        let mut doc = TantivyDocument::new();
        doc.add_text(schema.site_id, site_id);
        doc.add_text(schema.path, path);
        doc.add_text(schema.dirname, dirname);
        doc.add_text(schema.basename, basename);
        doc.add_u64(schema.is_dir, u64::from(is_dir));
        doc.add_u64(schema.is_root, u64::from(is_root));
        doc.add_text(schema.full_url, full_url);

        for term in super::terms::terms(basename) {
            doc.add_text(schema.basename_terms, &term);
            doc.add_text(schema.stem_en, &term);
            doc.add_text(schema.stem_es, &term);
        }
        for segment in dirname.split('/').filter(|s| !s.is_empty()) {
            for term in super::terms::terms(segment) {
                doc.add_text(schema.dirname_terms, &term);
            }
        }
        if let Some(content) = content {
            for term in super::terms::terms(&content) {
                doc.add_text(schema.content, &term);
            }
        }

        self.engine.add_document(doc)
    }
}

fn directory_prefix(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    format!("{}/", path.trim_end_matches('/'))
}
