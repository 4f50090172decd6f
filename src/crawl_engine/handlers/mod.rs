//! Protocol handlers: one listing in, a typed outcome out (§4.4).
//!
//! A handler is selected per task by site override or by URL scheme, via a
//! small trait/registry rather than subclass discovery (§9).

pub mod file;
pub mod ftp;
pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::queue::{CrawlTask, ResultQueue, TaskQueue};

use super::types::HandlerOutcome;

/// Executes one directory listing for a given URL scheme.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// The URL scheme this handler serves (`"ftp"`, `"http"`, `"file"`, ...).
    fn scheme(&self) -> &str;

    /// Contact the remote, list the directory at `task.url`, and report the
    /// outcome to `tasks`/`results` per the contract in §4.4. The handler
    /// itself is responsible for calling `report_done`/`report_error_dir`/
    /// `report_error_site` — callers only observe the returned
    /// [`HandlerOutcome`] for logging.
    async fn execute(&self, task: &CrawlTask, tasks: &TaskQueue, results: &ResultQueue)
    -> HandlerOutcome;
}

/// Maps a scheme (or a site's `handler` override) to the handler that
/// serves it, in place of the original's subclass-discovery registry.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under both its own name and its scheme, so a
    /// site's `handler` override and plain scheme dispatch share one table.
    pub fn register(&mut self, name: &str, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.insert(name.to_string(), handler.clone());
        self.handlers
            .entry(handler.scheme().to_string())
            .or_insert(handler);
    }

    /// Resolve a handler for `task`: the site's `handler` override takes
    /// precedence over scheme-based dispatch.
    #[must_use]
    pub fn resolve(
        &self,
        handler_override: Option<&str>,
        scheme: &str,
    ) -> Option<Arc<dyn ProtocolHandler>> {
        if let Some(name) = handler_override
            && let Some(h) = self.handlers.get(name)
        {
            return Some(h.clone());
        }
        self.handlers.get(scheme).cloned()
    }

    /// Register the three built-in handlers under their default schemes.
    #[must_use]
    pub fn with_defaults(request_timeout: std::time::Duration) -> Self {
        let mut registry = Self::new();
        registry.register("ftp", Arc::new(ftp::FtpHandler::new(request_timeout)));
        registry.register(
            "http",
            Arc::new(http::HttpHandler::new(request_timeout)),
        );
        registry.register("file", Arc::new(file::FileHandler::new()));
        registry
    }
}
