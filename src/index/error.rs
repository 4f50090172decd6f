//! Error type for the index module, in the same shape as the teacher's
//! `search::errors::SearchError`.

use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to initialize search index: {0}")]
    Initialization(String),

    #[error("failed to acquire index writer (retry recommended): {0}")]
    WriterAcquisition(String),

    #[error("failed to commit index changes: {0}")]
    Commit(String),

    #[error("failed to execute query: {0}")]
    QueryExecution(String),

    #[error("invalid search query: {0}")]
    QueryParsing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("tantivy query parser error: {0}")]
    QueryParser(#[from] tantivy::query::QueryParserError),
}

impl IndexError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IndexError::WriterAcquisition(_) | IndexError::Io(_) | IndexError::Commit(_)
        )
    }
}
