//! Crawler pool: a fixed-size set of worker tasks pulling from the
//! `TaskQueue` and dispatching to a handler (§4.5).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::queue::{QueueError, ResultQueue, TaskQueue};
use crate::site::SiteConfig;

use super::handlers::HandlerRegistry;
use super::types::HandlerOutcome;

/// N worker tasks pulling from one `TaskQueue`, dispatching to handlers by
/// site override or URL scheme, and reporting into one `ResultQueue`.
pub struct CrawlerPool {
    tasks: Arc<TaskQueue>,
    results: Arc<ResultQueue>,
    registry: Arc<HandlerRegistry>,
    site_configs: Arc<std::collections::HashMap<String, SiteConfig>>,
    num_workers: usize,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl CrawlerPool {
    #[must_use]
    pub fn new(
        tasks: Arc<TaskQueue>,
        results: Arc<ResultQueue>,
        registry: Arc<HandlerRegistry>,
        sites: &[SiteConfig],
        num_workers: usize,
        poll_interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        let site_configs = sites
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect::<std::collections::HashMap<_, _>>();
        Self {
            tasks,
            results,
            registry,
            site_configs: Arc::new(site_configs),
            num_workers,
            poll_interval,
            running,
        }
    }

    /// Spawn `num_workers` tokio tasks, each running an independent
    /// get/dispatch/sleep loop. Returns their join handles so the supervisor
    /// can await them on shutdown.
    #[must_use]
    pub fn spawn(&self) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.num_workers)
            .map(|id| {
                let tasks = self.tasks.clone();
                let results = self.results.clone();
                let registry = self.registry.clone();
                let site_configs = self.site_configs.clone();
                let running = self.running.clone();
                let poll_interval = self.poll_interval;
                tokio::spawn(async move {
                    worker_loop(id, tasks, results, registry, site_configs, running, poll_interval)
                        .await;
                })
            })
            .collect()
    }
}

async fn worker_loop(
    id: usize,
    tasks: Arc<TaskQueue>,
    results: Arc<ResultQueue>,
    registry: Arc<HandlerRegistry>,
    site_configs: Arc<std::collections::HashMap<String, SiteConfig>>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    info!(worker = id, "crawler worker starting");
    while running.load(Ordering::Relaxed) {
        let iteration = AssertUnwindSafe(worker_iteration(
            id,
            &tasks,
            &results,
            &registry,
            &site_configs,
            poll_interval,
        ))
        .catch_unwind()
        .await;

        if let Err(panic) = iteration {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(worker = id, panic = %msg, "worker iteration panicked; continuing");
            continue;
        }
    }
    info!(worker = id, "crawler worker stopped");
}

/// One get/dispatch cycle, run through `catch_unwind` by the caller so a
/// single panicking iteration (e.g. a handler bug) doesn't kill the worker.
async fn worker_iteration(
    id: usize,
    tasks: &Arc<TaskQueue>,
    results: &Arc<ResultQueue>,
    registry: &Arc<HandlerRegistry>,
    site_configs: &std::collections::HashMap<String, SiteConfig>,
    poll_interval: Duration,
) {
    let task = match tasks.get().await {
        Ok(task) => task,
        Err(QueueError::EmptyQueue) => {
            tokio::time::sleep(poll_interval).await;
            return;
        }
        Err(e) => {
            warn!(worker = id, error = %e, "task queue error; backing off");
            tokio::time::sleep(poll_interval).await;
            return;
        }
    };

    let handler_override = site_configs.get(&task.site_id).and_then(|s| s.handler.as_deref());
    let scheme = task.url.scheme();

    let Some(handler) = registry.resolve(handler_override, scheme) else {
        warn!(worker = id, site = %task.site_id, scheme, "no handler for scheme; stalling task");
        let _ = tasks.report_error_site(&task).await;
        return;
    };

    let outcome = handler.execute(&task, tasks.as_ref(), results.as_ref()).await;
    match outcome {
        HandlerOutcome::Done(result) => {
            debug!(worker = id, site = %task.site_id, path = %result.task.url.path(), found = result.found, "listing complete");
        }
        HandlerOutcome::ErrorSite => {
            debug!(worker = id, site = %task.site_id, "site-level error; cooling down");
        }
        HandlerOutcome::ErrorDir => {
            debug!(worker = id, site = %task.site_id, path = %task.url.path(), "directory-level error");
        }
    }
}
