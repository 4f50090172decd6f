//! Process lifecycle: opens the queues (triggering their startup
//! reconciliation), builds the crawler pool and index processor, and owns
//! their join handles (§4.9).
//!
//! The supervisor does not wire any OS signal handling itself (§1); callers
//! own waiting on whatever stop condition they have and then calling
//! [`Supervisor::stop`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use tantivy::Index;

use crate::config::CrawlerConfig;
use crate::crawl_engine::{CrawlerPool, HandlerRegistry};
use crate::error::{CrawlCoreError, CrawlCoreResult};
use crate::index::schema::IndexSchema;
use crate::index::{IndexEngine, IndexProcessor};
use crate::persist::open_pool;
use crate::queue::{ResultQueue, TaskQueue};
use crate::search::Searcher;

pub struct Supervisor {
    running: Arc<AtomicBool>,
    tasks: Arc<TaskQueue>,
    results: Arc<ResultQueue>,
    index_handle: Index,
    index_schema: IndexSchema,
    pool_handles: Vec<JoinHandle<()>>,
    processor_handle: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Open the queue databases and index (running their startup
    /// reconciliation), then spawn the crawler pool workers and the index
    /// processor task.
    pub async fn start(config: &CrawlerConfig) -> CrawlCoreResult<Self> {
        let site_ids: Vec<String> = config.sites().iter().map(|s| s.id.clone()).collect();

        let tasks_pool = open_pool(&config.tasks_db_path()).await?;
        let task_queue = Arc::new(TaskQueue::open(tasks_pool, config.sites()).await?);

        let results_pool = open_pool(&config.results_db_path()).await?;
        let result_queue = Arc::new(ResultQueue::open(results_pool, &site_ids).await?);

        let engine = IndexEngine::open(config.index_dir()).await?;
        let index_handle = engine.index_handle();
        let index_schema = engine.schema().clone();
        let mut processor =
            IndexProcessor::new(engine, result_queue.clone(), task_queue.clone(), config.poll_interval());
        processor
            .purge_unconfigured_sites(&site_ids)
            .map_err(CrawlCoreError::Index)?;

        let running = Arc::new(AtomicBool::new(true));

        let registry = Arc::new(HandlerRegistry::with_defaults(config.request_timeout()));
        let pool = CrawlerPool::new(
            task_queue.clone(),
            result_queue.clone(),
            registry,
            config.sites(),
            config.num_crawlers(),
            config.poll_interval(),
            running.clone(),
        );
        let pool_handles = pool.spawn();

        let processor_running = running.clone();
        let processor_handle = tokio::spawn(async move {
            processor.run(processor_running).await;
        });

        info!(
            num_crawlers = config.num_crawlers(),
            sites = site_ids.len(),
            "supervisor started"
        );

        Ok(Self {
            running,
            tasks: task_queue,
            results: result_queue,
            index_handle,
            index_schema,
            pool_handles,
            processor_handle: Some(processor_handle),
        })
    }

    #[must_use]
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Open an independent read-only [`Searcher`] against the running
    /// index (§9: the searcher holds its own reader, never the writer).
    pub fn searcher(&self) -> CrawlCoreResult<Searcher> {
        Searcher::open(self.index_handle.clone(), self.index_schema.clone())
            .map_err(CrawlCoreError::Index)
    }

    /// Clear the running flag, join every worker and the processor task,
    /// then close both queues. Workers finish their in-flight task before
    /// exiting (§5 cancellation model); this does not forcibly abort them.
    pub async fn stop(mut self) {
        info!("supervisor stopping");
        self.running.store(false, Ordering::Relaxed);

        for handle in self.pool_handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "crawler worker task panicked");
            }
        }
        if let Some(handle) = self.processor_handle.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "index processor task panicked");
        }

        self.tasks.close().await;
        self.results.close().await;
        info!("supervisor stopped");
    }
}
