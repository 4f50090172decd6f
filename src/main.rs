//! Crawler daemon entry point.
//!
//! Reads a [`arachne_core::CrawlerConfig`] serialized as JSON from the path
//! given as the first argument (or `./crawler.json`), starts the
//! supervisor, and runs until interrupted. Parsing richer config file
//! formats or CLI flags is an external concern (§1); this binary only
//! loads the crate's own typed config shape.

use std::env;
use std::path::PathBuf;

use arachne_core::{CrawlCoreError, CrawlerConfig, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    tracing_subscriber::fmt::init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("crawler.json"));

    let raw = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", config_path.display()))?;
    let config: CrawlerConfig = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", config_path.display()))?;

    let supervisor = Supervisor::start(&config)
        .await
        .map_err(|e: CrawlCoreError| anyhow::anyhow!(e))?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {e}"))?;

    supervisor.stop().await;
    Ok(())
}
