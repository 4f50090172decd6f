//! HTTP autoindex handler: `GET` the directory URL and parse `<a href>`
//! links out of the listing page the server generates (mod_autoindex,
//! nginx `autoindex on`, and similar).
//!
//! A relative link ending in `/` is a subdirectory; any other relative link
//! is a file. Links that are absolute to another host, that carry a query
//! string, or that point above the current directory (`../`) are ignored,
//! matching the original's link filter.

use async_trait::async_trait;
use log::warn;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};

use crate::queue::{CrawlEntry, CrawlResult, CrawlTask, ResultQueue, TaskQueue};

use super::ProtocolHandler;
use crate::crawl_engine::types::HandlerOutcome;

pub struct HttpHandler {
    client: Client,
}

impl HttpHandler {
    #[must_use]
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

#[async_trait]
impl ProtocolHandler for HttpHandler {
    fn scheme(&self) -> &str {
        "http"
    }

    async fn execute(
        &self,
        task: &CrawlTask,
        tasks: &TaskQueue,
        results: &ResultQueue,
    ) -> HandlerOutcome {
        let url = task.url.to_string();

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("http: request to {url} failed: {e}");
                let _ = tasks.report_error_site(task).await;
                return HandlerOutcome::ErrorSite;
            }
        };

        if response.status() == StatusCode::NOT_FOUND {
            let result = CrawlResult::not_found(task.clone());
            if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
                return HandlerOutcome::ErrorSite;
            }
            return HandlerOutcome::Done(result);
        }

        if !response.status().is_success() {
            warn!("http: {url} returned {}", response.status());
            let _ = tasks.report_error_site(task).await;
            return HandlerOutcome::ErrorSite;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("http: failed reading body of {url}: {e}");
                let _ = tasks.report_error_site(task).await;
                return HandlerOutcome::ErrorSite;
            }
        };

        let links = extract_relative_links(&body);
        if links.is_empty() {
            warn!("http: no relative links found in listing at {url}");
            let _ = tasks.report_error_dir(task).await;
            return HandlerOutcome::ErrorDir;
        }

        let mut result = CrawlResult::found(task.clone());
        for href in links {
            let is_dir = href.ends_with('/');
            let Ok(entry_url) = task.url.join(&href) else {
                continue;
            };
            let name = href.trim_end_matches('/').to_string();
            result.push(name, CrawlEntry {
                is_dir,
                url: entry_url,
                content_text: None,
            });
        }

        if results.put(&result).await.is_err() || tasks.report_done(task).await.is_err() {
            return HandlerOutcome::ErrorSite;
        }
        HandlerOutcome::Done(result)
    }
}

/// Pull every plausible directory-entry `href` out of an autoindex page:
/// relative, no query string, not a parent-directory link.
fn extract_relative_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !is_listing_entry(href) {
            continue;
        }
        links.push(href.to_string());
    }
    links
}

fn is_listing_entry(href: &str) -> bool {
    if href.is_empty() || href == "../" || href == ".." || href == "./" {
        return false;
    }
    if href.contains("://") || href.starts_with("//") {
        return false;
    }
    if href.starts_with('?') || href.starts_with('#') {
        return false;
    }
    if href.contains('?') {
        return false;
    }
    !href.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_directory_and_file_links() {
        let html = r#"
            <html><body>
            <a href="../">Parent Directory</a>
            <a href="pub/">pub/</a>
            <a href="readme.txt">readme.txt</a>
            <a href="?C=N;O=D">Name</a>
            <a href="https://elsewhere.example/x">external</a>
            </body></html>
        "#;
        let links = extract_relative_links(html);
        assert_eq!(links, vec!["pub/".to_string(), "readme.txt".to_string()]);
    }

    #[test]
    fn rejects_absolute_and_query_links() {
        assert!(!is_listing_entry("/elsewhere"));
        assert!(!is_listing_entry("http://h/x"));
        assert!(!is_listing_entry("?sort=name"));
        assert!(is_listing_entry("sub/"));
        assert!(is_listing_entry("file.txt"));
    }
}
