//! The `TaskQueue` and `ResultQueue`: the two durable, per-site queues that
//! decouple the crawler pool from the index processor (§4.2, §4.3).

pub mod error;
pub mod result_queue;
pub mod task_queue;
pub mod types;

pub use error::{QueueError, QueueResult};
pub use result_queue::ResultQueue;
pub use task_queue::TaskQueue;
pub use types::{CrawlEntry, CrawlResult, CrawlTask};
