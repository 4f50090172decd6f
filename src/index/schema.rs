//! Tantivy schema realizing the §3 document model.
//!
//! Xapian-style boolean term prefixes (`S`, `I`, `R`, `B`, `D`, `Z`, `C`) map
//! onto distinct tantivy fields rather than onto one field carrying
//! differently-prefixed terms — tantivy has no raw-term-prefix concept, so
//! each prefix from the original becomes its own indexed field, and each
//! stored slot (`SITE_ID`, `IS_DIR`, ...) is the `stored` half of that same
//! field wherever the two coincide.

use anyhow::{Context, Result};
use tantivy::schema::{
    IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer, TokenizerManager};

use tantivy::schema::Field;

const EXACT_TOKENIZER: &str = "arachne_exact";
const TERMS_TOKENIZER: &str = "arachne_terms";
const STEM_EN_TOKENIZER: &str = "arachne_stem_en";
const STEM_ES_TOKENIZER: &str = "arachne_stem_es";

/// Bump when a field is added, removed, or retyped; `IndexEngine::open`
/// recreates the on-disk index when the stored count disagrees (mirrors the
/// teacher's own schema-version mismatch handling).
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub schema: Schema,
    /// `S` prefix / `SITE_ID` slot.
    pub site_id: Field,
    /// `I` prefix / `IS_DIR` slot, stored as 0/1.
    pub is_dir: Field,
    /// `R` prefix / `IS_ROOT` slot, stored as 0/1.
    pub is_root: Field,
    /// `PATH` slot; exact-matched, used as the per-document delete key.
    pub path: Field,
    /// `BASENAME` slot, raw stored string.
    pub basename: Field,
    /// `B` prefix: extracted search terms over the basename.
    pub basename_terms: Field,
    /// `DIRNAME` slot, raw stored string, always trailing-slash terminated.
    pub dirname: Field,
    /// `D` prefix: extracted search terms over the dirname.
    pub dirname_terms: Field,
    /// `Z` prefix, English half of the stemmed-term union.
    pub stem_en: Field,
    /// `Z` prefix, Spanish half of the stemmed-term union.
    pub stem_es: Field,
    /// `C` prefix: optional extracted content, populated by a
    /// `ContentExtractor` hook that returns `None` by default.
    pub content: Field,
    /// Stored-only; the original's `doc.get_data()` slot, carrying the full
    /// URL (scheme/host/port/path) of every document. `path` itself carries
    /// only the URL's path component, scoped by `site_id`.
    pub full_url: Field,
}

impl IndexSchema {
    pub fn build() -> Result<Self> {
        let mut builder = Schema::builder();

        let exact_indexing = TextFieldIndexing::default()
            .set_tokenizer(EXACT_TOKENIZER)
            .set_index_option(IndexRecordOption::Basic);
        let exact_stored = TextOptions::default()
            .set_stored()
            .set_indexing_options(exact_indexing.clone());

        let site_id = builder.add_text_field("site_id", exact_stored.clone());
        let path = builder.add_text_field("path", exact_stored.clone());
        let basename = builder.add_text_field("basename", exact_stored.clone());
        let dirname = builder.add_text_field("dirname", exact_stored.clone());

        let flag_options = NumericOptions::default().set_stored().set_indexed();
        let is_dir = builder.add_u64_field("is_dir", flag_options.clone());
        let is_root = builder.add_u64_field("is_root", flag_options);

        let terms_indexing = TextFieldIndexing::default()
            .set_tokenizer(TERMS_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let terms_options = TextOptions::default().set_indexing_options(terms_indexing);
        let basename_terms = builder.add_text_field("basename_terms", terms_options.clone());
        let dirname_terms = builder.add_text_field("dirname_terms", terms_options.clone());
        let content = builder.add_text_field(
            "content",
            TextOptions::default()
                .set_stored()
                .set_indexing_options(terms_options.clone()),
        );

        let stem_en_indexing = TextFieldIndexing::default()
            .set_tokenizer(STEM_EN_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let stem_es_indexing = TextFieldIndexing::default()
            .set_tokenizer(STEM_ES_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let stem_en = builder.add_text_field(
            "stem_en",
            TextOptions::default().set_indexing_options(stem_en_indexing),
        );
        let stem_es = builder.add_text_field(
            "stem_es",
            TextOptions::default().set_indexing_options(stem_es_indexing),
        );

        let full_url = builder.add_text_field(
            "full_url",
            TextOptions::default()
                .set_stored()
                .set_indexing_options(exact_indexing),
        );

        let schema = builder.build();

        Ok(Self {
            schema,
            site_id,
            is_dir,
            is_root,
            path,
            basename,
            basename_terms,
            dirname,
            dirname_terms,
            stem_en,
            stem_es,
            content,
            full_url,
        })
    }

    /// Register the custom tokenizers this schema's fields reference.
    pub fn register_tokenizers(manager: &TokenizerManager) -> Result<()> {
        let exact = TextAnalyzer::builder(tantivy::tokenizer::RawTokenizer::default())
            .filter(LowerCaser)
            .build();
        manager.register(EXACT_TOKENIZER, exact);

        let terms = TextAnalyzer::builder(tantivy::tokenizer::WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .build();
        manager.register(TERMS_TOKENIZER, terms);

        let stem_en = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        manager.register(STEM_EN_TOKENIZER, stem_en);

        let stem_es = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::Spanish))
            .build();
        manager.register(STEM_ES_TOKENIZER, stem_es);

        Ok(())
    }
}

pub fn build_and_register(manager: &TokenizerManager) -> Result<IndexSchema> {
    let schema = IndexSchema::build().context("building index schema")?;
    IndexSchema::register_tokenizers(manager).context("registering index tokenizers")?;
    Ok(schema)
}
