//! Owns the tantivy `Index`, the single writer, and a reader handle,
//! grounded on the teacher's `SearchEngine::create` (schema-version
//! mismatch -> recreate-from-scratch, not a migration).

use std::path::{Path, PathBuf};

use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, Term, TantivyDocument};
use tantivy::query::Query;

use super::error::{IndexError, IndexResult};
use super::schema::{IndexSchema, SCHEMA_VERSION};

/// Default heap size for the writer (teacher's search engine uses a
/// similarly modest default before any per-deployment override).
const DEFAULT_WRITER_MEMORY: usize = 50_000_000;

pub struct IndexEngine {
    index: Index,
    schema: IndexSchema,
    writer: IndexWriter,
    reader: IndexReader,
    index_path: PathBuf,
}

impl IndexEngine {
    pub async fn open(index_dir: &Path) -> IndexResult<Self> {
        tokio::fs::create_dir_all(index_dir).await?;

        let schema = IndexSchema::build()
            .map_err(|e| IndexError::Initialization(e.to_string()))?;

        let version_marker = index_dir.join(".schema_version");
        let stored_version = tokio::fs::read_to_string(&version_marker)
            .await
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());

        let meta_exists = index_dir.join("meta.json").exists();
        let needs_recreate = meta_exists && stored_version != Some(SCHEMA_VERSION);

        if needs_recreate {
            tracing::warn!(
                dir = %index_dir.display(),
                "index schema version mismatch, recreating index from scratch"
            );
            tokio::fs::remove_dir_all(index_dir).await?;
            tokio::fs::create_dir_all(index_dir).await?;
        }

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir)?
        } else {
            let dir = MmapDirectory::open(index_dir)?;
            Index::create(dir, schema.schema.clone(), IndexSettings::default())?
        };

        IndexSchema::register_tokenizers(index.tokenizers())
            .map_err(|e| IndexError::Initialization(e.to_string()))?;

        tokio::fs::write(&version_marker, SCHEMA_VERSION.to_string()).await?;

        let writer: IndexWriter = index
            .writer(DEFAULT_WRITER_MEMORY)
            .map_err(|e| IndexError::WriterAcquisition(e.to_string()))?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            schema,
            writer,
            reader,
            index_path: index_dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    #[must_use]
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// Clone of the underlying `Index` handle for an independent reader
    /// (tantivy's `Index` is internally `Arc`-backed), used by the searcher.
    #[must_use]
    pub fn index_handle(&self) -> Index {
        self.index.clone()
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn add_document(&mut self, doc: TantivyDocument) -> IndexResult<()> {
        self.writer.add_document(doc)?;
        Ok(())
    }

    pub fn delete_path(&mut self, path: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.schema.path, path));
    }

    pub fn delete_query(&mut self, query: Box<dyn Query>) -> IndexResult<()> {
        self.writer.delete_query(query)?;
        Ok(())
    }

    pub fn commit(&mut self) -> IndexResult<()> {
        self.writer
            .commit()
            .map_err(|e| IndexError::Commit(e.to_string()))?;
        self.reader.reload()?;
        Ok(())
    }
}
