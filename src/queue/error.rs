//! Error taxonomy for the queue family.

use thiserror::Error;

/// Errors produced by `TaskQueue`/`ResultQueue` operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// `get()` found nothing ready. Never a failure condition by itself —
    /// callers sleep and poll again (§4.5).
    #[error("queue is empty")]
    EmptyQueue,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode/decode queue payload: {0}")]
    Serialization(#[from] Box<bincode::ErrorKind>),
}

pub type QueueResult<T> = Result<T, QueueError>;
