//! End-to-end scenarios wiring the `TaskQueue`, `ResultQueue`, and
//! `IndexProcessor` together without a real crawler handler.
//!
//! Results are constructed directly and fed through [`submit`], which mirrors
//! exactly what `crawl_engine::handlers::{file,ftp,http}` do on a successful
//! fetch: `results.put(&result)` followed immediately by
//! `tasks.report_done(&task)` (§4.4) — the task-queue bookkeeping belongs to
//! the handler, not the index processor, which only ever calls `put_visited`
//! once it has reconciled the result.
//!
//! `TaskQueue` schedules against real wall-clock time (no simulated-clock
//! injection point), so the politeness/error waits used here are kept to one
//! real second, matching the crate's own unit-test convention in
//! `task_queue.rs`.

use std::sync::Arc;
use std::time::Duration;

use arachne_core::Filetype;
use arachne_core::index::{IndexEngine, IndexProcessor};
use arachne_core::queue::{CrawlEntry, CrawlResult, CrawlTask, QueueError, ResultQueue, TaskQueue};
use arachne_core::search::Searcher;
use arachne_core::site::SiteConfig;
use arachne_core::siteurl::SiteUrl;

use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn memory_pool() -> sqlx::SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

fn site(id: &str, root: &str) -> SiteConfig {
    let mut s = SiteConfig::new(SiteUrl::parse(root).unwrap());
    s.id = id.to_string();
    s.request_wait = 1;
    s.error_site_wait = 1;
    s.default_revisit_wait = 1;
    s.min_revisit_wait = 0;
    s
}

/// Hand a result to the `ResultQueue` and mark its task done on the
/// `TaskQueue`, the way a `ProtocolHandler` does on success.
async fn submit(tasks: &TaskQueue, results: &ResultQueue, result: CrawlResult) {
    results.put(&result).await.unwrap();
    tasks.report_done(&result.task).await.unwrap();
}

/// Run one `IndexProcessor::run_once()` and assert it actually processed a
/// result (as opposed to finding the `ResultQueue` empty).
async fn drain_one(processor: &mut IndexProcessor) {
    assert!(processor.run_once().await.unwrap(), "expected a result to process");
}

#[tokio::test]
async fn root_revisit_is_rescheduled_after_default_revisit_wait() {
    let index_dir = TempDir::new().unwrap();
    let a = site("a", "ftp://host/");

    let tasks = Arc::new(TaskQueue::open(memory_pool().await, &[a.clone()]).await.unwrap());
    let results = Arc::new(ResultQueue::open(memory_pool().await, &["a".to_string()]).await.unwrap());
    let engine = IndexEngine::open(index_dir.path()).await.unwrap();
    let mut processor = IndexProcessor::new(engine, results.clone(), tasks.clone(), Duration::from_millis(10));

    let root_task = tasks.get().await.unwrap();
    assert!(root_task.url.is_root());

    submit(&tasks, &results, CrawlResult::found(root_task.clone())).await;
    drain_one(&mut processor).await;

    // Immediately after processing, the site's request-wait cooldown (1s)
    // hasn't elapsed.
    assert!(matches!(tasks.get().await, Err(QueueError::EmptyQueue)));

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let revisited = tasks.get().await.unwrap();
    assert!(revisited.url.is_root());
    assert_eq!(revisited.site_id, "a");
    assert_eq!(revisited.revisit_count, 0);
}

#[tokio::test]
async fn listing_a_directory_indexes_entries_and_enqueues_child_tasks() {
    let index_dir = TempDir::new().unwrap();
    let a = site("a", "ftp://host/");

    let tasks = Arc::new(TaskQueue::open(memory_pool().await, &[a.clone()]).await.unwrap());
    let results = Arc::new(ResultQueue::open(memory_pool().await, &["a".to_string()]).await.unwrap());
    let engine = IndexEngine::open(index_dir.path()).await.unwrap();
    let schema = engine.schema().clone();
    let index_handle = engine.index_handle();
    let mut processor = IndexProcessor::new(engine, results.clone(), tasks.clone(), Duration::from_millis(10));
    processor.purge_unconfigured_sites(&["a".to_string()]).unwrap();

    let root_task = tasks.get().await.unwrap();
    let root_url = root_task.url.clone();

    let mut result = CrawlResult::found(root_task);
    result.push(
        "a".to_string(),
        CrawlEntry { is_dir: true, url: root_url.join("a").unwrap(), content_text: None },
    );
    result.push(
        "b.txt".to_string(),
        CrawlEntry { is_dir: false, url: root_url.join("b.txt").unwrap(), content_text: None },
    );
    submit(&tasks, &results, result).await;
    drain_one(&mut processor).await;

    let searcher = Searcher::open(index_handle, schema).unwrap();
    let sites = searcher.get_sites().unwrap();
    assert_eq!(sites.len(), 1);

    let (total, hits) = searcher.search("b", 0, 10, 10, &[], Filetype::All).unwrap();
    assert!(total >= 1, "expected b.txt to be found, got {hits:?}");
    assert!(hits.iter().any(|h| h.url.ends_with("/b.txt") && !h.is_dir));

    // Two tasks now pending: the revisit of root and the new task for the
    // freshly discovered subdirectory `/a`. Neither is retrievable yet: the
    // site itself just went on its `request_wait` cooldown.
    assert!(matches!(tasks.get().await, Err(QueueError::EmptyQueue)));
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // The `/a` task was enqueued with an earlier key (discovery time) than
    // root's revisit (discovery time + revisit_wait), so it comes first.
    let child = tasks.get().await.unwrap();
    assert_eq!(child.url.path(), "/a");
}

#[tokio::test]
async fn shrinking_a_listing_removes_the_dropped_subtree() {
    let index_dir = TempDir::new().unwrap();
    let a = site("a", "ftp://host/");

    let tasks = Arc::new(TaskQueue::open(memory_pool().await, &[a.clone()]).await.unwrap());
    let results = Arc::new(ResultQueue::open(memory_pool().await, &["a".to_string()]).await.unwrap());
    let engine = IndexEngine::open(index_dir.path()).await.unwrap();
    let schema = engine.schema().clone();
    let index_handle = engine.index_handle();
    let mut processor = IndexProcessor::new(engine, results.clone(), tasks.clone(), Duration::from_millis(10));

    let root_task = tasks.get().await.unwrap();
    let root_url = root_task.url.clone();

    // First visit: root has `a` (dir) and `b.txt`.
    let mut first = CrawlResult::found(root_task.clone());
    first.push("a".to_string(), CrawlEntry { is_dir: true, url: root_url.join("a").unwrap(), content_text: None });
    first.push("b.txt".to_string(), CrawlEntry { is_dir: false, url: root_url.join("b.txt").unwrap(), content_text: None });
    submit(&tasks, &results, first).await;
    drain_one(&mut processor).await;

    // The site just went on cooldown; the `/a` discovery task isn't
    // retrievable until `request_wait` elapses.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let a_task = tasks.get().await.unwrap();
    assert_eq!(a_task.url.path(), "/a");
    let a_url = a_task.url.clone();

    // Listing `/a` finds `x` and `y`.
    let mut a_result = CrawlResult::found(a_task);
    a_result.push("x".to_string(), CrawlEntry { is_dir: false, url: a_url.join("x").unwrap(), content_text: None });
    a_result.push("y".to_string(), CrawlEntry { is_dir: false, url: a_url.join("y").unwrap(), content_text: None });
    submit(&tasks, &results, a_result).await;
    drain_one(&mut processor).await;

    let searcher = Searcher::open(index_handle.clone(), schema.clone()).unwrap();
    let (total_before, _) = searcher.search("x", 0, 10, 10, &[], Filetype::All).unwrap();
    assert_eq!(total_before, 1);

    // Revisiting root (its revisit row has an earlier key than `/a`'s own
    // freshly-scheduled revisit, so it comes first once the site is ready
    // again), `a` is gone: only `b.txt` remains.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let root_revisit = tasks.get().await.unwrap();
    assert!(root_revisit.url.is_root());
    let mut second = CrawlResult::found(root_revisit);
    second.push("b.txt".to_string(), CrawlEntry { is_dir: false, url: root_url.join("b.txt").unwrap(), content_text: None });
    submit(&tasks, &results, second).await;
    drain_one(&mut processor).await;

    let searcher = Searcher::open(index_handle, schema).unwrap();
    let (total_x, _) = searcher.search("x", 0, 10, 10, &[], Filetype::All).unwrap();
    let (total_y, _) = searcher.search("y", 0, 10, 10, &[], Filetype::All).unwrap();
    let (total_a, _) = searcher.search("a", 0, 10, 10, &[], Filetype::All).unwrap();
    assert_eq!(total_x, 0);
    assert_eq!(total_y, 0);
    assert_eq!(total_a, 0);
    let (total_b, _) = searcher.search("b", 0, 10, 10, &[], Filetype::All).unwrap();
    assert_eq!(total_b, 1);
}

#[tokio::test]
async fn removing_a_site_from_config_purges_its_state_on_restart() {
    let index_dir = TempDir::new().unwrap();
    let tasks_pool = memory_pool().await;
    let results_pool = memory_pool().await;
    let a = site("a", "ftp://host-a/");
    let b = site("b", "ftp://host-b/");

    let tasks = Arc::new(TaskQueue::open(tasks_pool.clone(), &[a.clone(), b.clone()]).await.unwrap());
    let results = Arc::new(
        ResultQueue::open(results_pool.clone(), &["a".to_string(), "b".to_string()])
            .await
            .unwrap(),
    );
    let engine = IndexEngine::open(index_dir.path()).await.unwrap();
    let mut processor = IndexProcessor::new(engine, results.clone(), tasks.clone(), Duration::from_millis(10));

    // Seed a root document for each site.
    let mut seen_sites = std::collections::HashSet::new();
    for _ in 0..2 {
        let t = tasks.get().await.unwrap();
        seen_sites.insert(t.site_id.clone());
        submit(&tasks, &results, CrawlResult::found(t)).await;
        drain_one(&mut processor).await;
    }
    assert_eq!(seen_sites, ["a".to_string(), "b".to_string()].into_iter().collect());

    // A pending, not-yet-processed result for `b` should also be purged by
    // restart, not just its already-drained rows.
    let stray_task = CrawlTask::new_root("b".to_string(), b.root_url.clone(), b.default_revisit_wait);
    results.put(&CrawlResult::found(stray_task)).await.unwrap();
    drop(processor);

    // Restart with only site `a` configured: the queues drop `b`'s rows...
    let tasks2 = TaskQueue::open(tasks_pool, &[a.clone()]).await.unwrap();
    let results2 = Arc::new(ResultQueue::open(results_pool, &["a".to_string()]).await.unwrap());
    assert_eq!(results2.len().await.unwrap(), 0);

    // ...and the index processor's own startup purge drops `b`'s documents.
    let engine2 = IndexEngine::open(index_dir.path()).await.unwrap();
    let schema2 = engine2.schema().clone();
    let index_handle2 = engine2.index_handle();
    let tasks2 = Arc::new(tasks2);
    let mut processor2 = IndexProcessor::new(engine2, results2, tasks2.clone(), Duration::from_millis(10));
    processor2.purge_unconfigured_sites(&["a".to_string()]).unwrap();

    let searcher2 = Searcher::open(index_handle2, schema2).unwrap();
    let remaining = searcher2.get_sites().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "a");

    // Site `a`'s own scheduling state is untouched by the restart: its one
    // pending revisit row (from its earlier `put_visited`) survives rather
    // than being re-seeded from scratch.
    assert_eq!(tasks2.len().await.unwrap(), 1);
}

#[tokio::test]
async fn site_transient_failure_cools_down_then_retries() {
    let mut a = site("a", "ftp://host/");
    a.error_site_wait = 1;

    let tasks = Arc::new(TaskQueue::open(memory_pool().await, &[a.clone()]).await.unwrap());

    for _ in 0..3 {
        let task = tasks.get().await.unwrap();
        tasks.report_error_site(&task).await.unwrap();
        assert!(matches!(tasks.get().await, Err(QueueError::EmptyQueue)));
    }

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let retried = tasks.get().await.unwrap();
    assert!(retried.url.is_root());
    assert_eq!(retried.site_id, "a");
}
