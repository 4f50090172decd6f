//! The search index: schema, engine (writer/reader ownership), term
//! extraction, and the processor that reconciles crawl results into
//! documents (§4.6, §4.7).

pub mod engine;
pub mod error;
pub mod processor;
pub mod schema;
pub mod terms;

pub use engine::IndexEngine;
pub use error::{IndexError, IndexResult};
pub use processor::{ContentExtractor, IndexProcessor, NoopContentExtractor};
pub use schema::IndexSchema;
pub use terms::terms;
