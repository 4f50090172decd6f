//! Local filesystem handler: the directory's OS path is `task.url.path()`
//! taken literally, mirroring the original's `os.listdir`/`os.path.isdir`
//! handler.

use std::io::ErrorKind;

use async_trait::async_trait;
use log::warn;

use crate::queue::{CrawlEntry, CrawlResult, CrawlTask, ResultQueue, TaskQueue};

use super::ProtocolHandler;
use crate::crawl_engine::types::HandlerOutcome;

pub struct FileHandler;

impl FileHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolHandler for FileHandler {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn execute(
        &self,
        task: &CrawlTask,
        tasks: &TaskQueue,
        results: &ResultQueue,
    ) -> HandlerOutcome {
        let path = task.url.path();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return self.finish_not_found(task, tasks, results).await;
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("file: permission denied listing {path}");
                let _ = tasks.report_error_dir(task).await;
                return HandlerOutcome::ErrorDir;
            }
            Err(e) => {
                warn!("file: transient error listing {path}: {e}");
                let _ = tasks.report_error_site(task).await;
                return HandlerOutcome::ErrorSite;
            }
        };

        if !metadata.is_dir() {
            return self.finish_not_found(task, tasks, results).await;
        }

        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(e) => e,
            Err(e) => {
                warn!("file: read_dir failed for {path}: {e}");
                let _ = tasks.report_error_dir(task).await;
                return HandlerOutcome::ErrorDir;
            }
        };

        let mut result = CrawlResult::found(task.clone());
        loop {
            let next = match entries.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    warn!("file: directory entry read failed under {path}: {e}");
                    let _ = tasks.report_error_dir(task).await;
                    return HandlerOutcome::ErrorDir;
                }
            };
            let name = next.file_name().to_string_lossy().into_owned();
            let is_dir = next
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let Ok(url) = task.url.join(&name) else {
                continue;
            };
            result.push(name, CrawlEntry {
                is_dir,
                url,
                content_text: None,
            });
        }

        if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
            return HandlerOutcome::ErrorSite;
        }
        HandlerOutcome::Done(result)
    }
}

impl FileHandler {
    async fn finish_not_found(
        &self,
        task: &CrawlTask,
        tasks: &TaskQueue,
        results: &ResultQueue,
    ) -> HandlerOutcome {
        let result = CrawlResult::not_found(task.clone());
        if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
            return HandlerOutcome::ErrorSite;
        }
        HandlerOutcome::Done(result)
    }
}
