//! Multi-site durable buffer of crawl results awaiting processing (§4.3).
//!
//! Shaped like the `TaskQueue` but every key is a fixed sentinel: there is no
//! cooldown to schedule, only insertion order. §5 additionally guarantees
//! the queue "preserves FIFO across sites of `put` order", so rather than
//! round-robining a per-site sub-queue this keeps one globally ordered
//! table and filters out results belonging to sites no longer configured as
//! it scans — which realizes the same "skip and lazily delete" behavior
//! described for the sites-queue, without a second table whose ordering
//! could drift from the simple FIFO guarantee.

use std::collections::HashSet;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::persist::OrderedQueue;

use super::error::{QueueError, QueueResult};
use super::types::CrawlResult;

/// All rows share this key; only relative insertion order (rowid) matters.
const SENTINEL_KEY: &str = "00000000000000000000";

pub struct ResultQueue {
    results: OrderedQueue,
    configured_sites: HashSet<String>,
    guard: Mutex<()>,
}

impl ResultQueue {
    /// Open the results database and perform startup reconciliation: delete
    /// every stored result whose site is no longer configured.
    pub async fn open(pool: SqlitePool, configured_site_ids: &[String]) -> QueueResult<Self> {
        let results = OrderedQueue::create(pool, "results").await?;
        let configured_sites: HashSet<String> = configured_site_ids.iter().cloned().collect();

        for site_id in results.distinct_sites().await? {
            if !configured_sites.contains(&site_id) {
                results.delete_site(&site_id).await?;
            }
        }

        Ok(Self {
            results,
            configured_sites,
            guard: Mutex::new(()),
        })
    }

    pub async fn put(&self, result: &CrawlResult) -> QueueResult<()> {
        let _lock = self.guard.lock().await;
        let bytes = bincode::serialize(result)?;
        self.results
            .put(&result.task.site_id, SENTINEL_KEY, &bytes)
            .await?;
        Ok(())
    }

    /// Non-blocking head across every configured site in global insertion
    /// order, lazily deleting any row whose site is no longer configured.
    pub async fn get(&self) -> QueueResult<CrawlResult> {
        let _lock = self.guard.lock().await;
        loop {
            let Some(row) = self.results.head_any().await? else {
                return Err(QueueError::EmptyQueue);
            };
            if !self.configured_sites.contains(&row.site_id) {
                self.results.delete_row(row.rowid).await?;
                continue;
            }
            let result: CrawlResult = bincode::deserialize(&row.value)?;
            return Ok(result);
        }
    }

    /// Remove the head result (the one just returned by `get`).
    pub async fn report_done(&self, result: &CrawlResult) -> QueueResult<()> {
        let _lock = self.guard.lock().await;
        self.delete_first_matching(result).await
    }

    /// A processor couldn't yet handle this result; move it to the tail so
    /// other sites make progress.
    pub async fn report_error(&self, result: &CrawlResult) -> QueueResult<()> {
        let _lock = self.guard.lock().await;
        self.delete_first_matching(result).await?;
        let bytes = bincode::serialize(result)?;
        self.results
            .put(&result.task.site_id, SENTINEL_KEY, &bytes)
            .await?;
        Ok(())
    }

    async fn delete_first_matching(&self, result: &CrawlResult) -> QueueResult<()> {
        let sql = format!(
            "SELECT rowid, value FROM {} WHERE site_id = ?1 AND key = ?2 ORDER BY rowid ASC",
            self.results.table_name()
        );
        let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(&sql)
            .bind(&result.task.site_id)
            .bind(SENTINEL_KEY)
            .fetch_all(self.results.pool())
            .await?;
        for (rowid, value) in rows {
            if let Ok(stored) = bincode::deserialize::<CrawlResult>(&value) {
                if stored.task.site_id == result.task.site_id
                    && stored.task.url == result.task.url
                    && stored.found == result.found
                {
                    self.results.delete_row(rowid).await?;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<i64> {
        Ok(self.results.len(None).await?)
    }

    pub async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::types::CrawlTask;
    use crate::siteurl::SiteUrl;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn sample_result(site_id: &str, path: &str) -> CrawlResult {
        let url = SiteUrl::parse(&format!("ftp://host{path}")).unwrap();
        let task = CrawlTask::new_root(site_id.to_string(), url, 100);
        CrawlResult::found(task)
    }

    #[tokio::test]
    async fn put_then_get_returns_same_result() {
        let pool = memory_pool().await;
        let queue = ResultQueue::open(pool, &["a".to_string()]).await.unwrap();
        let result = sample_result("a", "/");
        queue.put(&result).await.unwrap();
        let fetched = queue.get().await.unwrap();
        assert_eq!(fetched.task.site_id, result.task.site_id);
    }

    #[tokio::test]
    async fn report_done_decreases_len_by_one() {
        let pool = memory_pool().await;
        let queue = ResultQueue::open(pool, &["a".to_string()]).await.unwrap();
        queue.put(&sample_result("a", "/")).await.unwrap();
        queue.put(&sample_result("a", "/x")).await.unwrap();
        let first = queue.get().await.unwrap();
        queue.report_done(&first).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fifo_preserved_across_sites_in_put_order() {
        let pool = memory_pool().await;
        let queue = ResultQueue::open(pool, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        queue.put(&sample_result("a", "/1")).await.unwrap();
        queue.put(&sample_result("b", "/2")).await.unwrap();
        queue.put(&sample_result("a", "/3")).await.unwrap();

        let first = queue.get().await.unwrap();
        queue.report_done(&first).await.unwrap();
        let second = queue.get().await.unwrap();
        queue.report_done(&second).await.unwrap();
        let third = queue.get().await.unwrap();

        assert_eq!(first.task.url.path(), "/1");
        assert_eq!(second.task.url.path(), "/2");
        assert_eq!(third.task.url.path(), "/3");
    }

    #[tokio::test]
    async fn report_error_moves_result_to_tail() {
        let pool = memory_pool().await;
        let queue = ResultQueue::open(pool, &["a".to_string()]).await.unwrap();
        queue.put(&sample_result("a", "/1")).await.unwrap();
        queue.put(&sample_result("a", "/2")).await.unwrap();
        let first = queue.get().await.unwrap();
        queue.report_error(&first).await.unwrap();
        let next = queue.get().await.unwrap();
        assert_eq!(next.task.url.path(), "/2");
    }

    #[tokio::test]
    async fn results_for_unconfigured_sites_are_purged_at_startup() {
        let pool = memory_pool().await;
        {
            let queue = ResultQueue::open(pool.clone(), &["a".to_string(), "b".to_string()])
                .await
                .unwrap();
            queue.put(&sample_result("a", "/1")).await.unwrap();
            queue.put(&sample_result("b", "/2")).await.unwrap();
        }
        let queue = ResultQueue::open(pool, &["a".to_string()]).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
