//! Protocol handlers and the crawler pool that dispatches to them (§4.4,
//! §4.5).

pub mod handlers;
pub mod pool;
pub mod types;

pub use handlers::{HandlerRegistry, ProtocolHandler};
pub use pool::CrawlerPool;
pub use types::HandlerOutcome;
