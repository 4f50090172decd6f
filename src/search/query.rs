//! Parses a user query string into plus/minus/normal term buckets and
//! assembles the tantivy query tree (§4.8), grounded on
//! `searcher.py::_parse_query()`'s `OP_AND_MAYBE` / `OP_FILTER` composition.
//!
//! Tantivy has no direct `OP_AND_MAYBE` or `OP_FILTER`: a `BooleanQuery`
//! with at least one `Must`/`MustNot` clause treats `Should` clauses as
//! score-only (not filtering), which is exactly `AND_MAYBE`'s semantics, so
//! the plus/normal combination maps over directly. `OP_FILTER` has no
//! score-free equivalent in tantivy; the site/filetype restriction is
//! applied as an extra `Must` clause, which does let it influence score
//! (a documented adaptation, see DESIGN.md).

use std::collections::HashSet;

use tantivy::Index;
use tantivy::query::{BooleanQuery, BoostQuery, EmptyQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

use crate::index::schema::IndexSchema;
use crate::index::terms;

use super::types::Filetype;

const BASENAME_BOOST: f32 = 10.0;
const DIRNAME_BOOST: f32 = 2.0;

struct ParsedTerms {
    plus: HashSet<String>,
    minus: HashSet<String>,
    normal: HashSet<String>,
}

fn split_terms(query: &str) -> ParsedTerms {
    let mut plus = HashSet::new();
    let mut minus = HashSet::new();
    let mut normal = HashSet::new();

    for token in query.split_whitespace() {
        if let Some(rest) = token.strip_prefix('+') {
            if !rest.is_empty() {
                plus.extend(terms::terms(rest));
            }
        } else if let Some(rest) = token.strip_prefix('-') {
            if !rest.is_empty() {
                minus.extend(terms::terms(rest));
            }
        } else {
            normal.extend(terms::terms(token));
        }
    }

    ParsedTerms { plus, minus, normal }
}

fn field_term_query(index: &Index, fields: Vec<Field>, term: &str) -> tantivy::Result<Box<dyn Query>> {
    let parser = QueryParser::for_index(index, fields);
    parser.parse_query(term)
}

/// `OR` of `field_term_query` across every term, or `None` if `terms` is
/// empty.
fn or_over_terms(
    index: &Index,
    fields: Vec<Field>,
    terms: &HashSet<String>,
) -> tantivy::Result<Option<Box<dyn Query>>> {
    if terms.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(terms.len());
    for term in terms {
        clauses.push((Occur::Should, field_term_query(index, fields.clone(), term)?));
    }
    Ok(Some(Box::new(BooleanQuery::new(clauses))))
}

/// `AND` of `field_term_query` across every term, or `None` if `terms` is
/// empty.
fn and_over_terms(
    index: &Index,
    field: Field,
    terms: &HashSet<String>,
) -> tantivy::Result<Option<Box<dyn Query>>> {
    if terms.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(terms.len());
    for term in terms {
        clauses.push((Occur::Must, field_term_query(index, vec![field], term)?));
    }
    Ok(Some(Box::new(BooleanQuery::new(clauses))))
}

fn site_ids_query(schema: &IndexSchema, site_ids: &[String]) -> Option<Box<dyn Query>> {
    if site_ids.is_empty() {
        return None;
    }
    let clauses: Vec<(Occur, Box<dyn Query>)> = site_ids
        .iter()
        .map(|id| {
            let term = Term::from_field_text(schema.site_id, id);
            (
                Occur::Should,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn Query>,
            )
        })
        .collect();
    Some(Box::new(BooleanQuery::new(clauses)))
}

fn filetype_query(schema: &IndexSchema, filetype: Filetype) -> Option<Box<dyn Query>> {
    let value = match filetype {
        Filetype::All => return None,
        Filetype::File => 0,
        Filetype::Directory => 1,
    };
    let term = Term::from_field_u64(schema.is_dir, value);
    Some(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
}

/// Build the final query for `search()` (§4.8). Returns an [`EmptyQuery`]
/// (matches nothing) when the parsed query has no terms at all.
pub(crate) fn build_query(
    index: &Index,
    schema: &IndexSchema,
    query_str: &str,
    site_ids: &[String],
    filetype: Filetype,
) -> tantivy::Result<Box<dyn Query>> {
    let parsed = split_terms(query_str);

    let plus_query = and_over_terms(index, schema.basename_terms, &parsed.plus)?;
    let minus_query = or_over_terms(index, vec![schema.basename_terms], &parsed.minus)?;

    let normal_query = if parsed.normal.is_empty() {
        None
    } else {
        let basename_query = or_over_terms(index, vec![schema.basename_terms], &parsed.normal)?
            .map(|q| Box::new(BoostQuery::new(q, BASENAME_BOOST)) as Box<dyn Query>);
        let dirname_query = or_over_terms(index, vec![schema.dirname_terms], &parsed.normal)?
            .map(|q| Box::new(BoostQuery::new(q, DIRNAME_BOOST)) as Box<dyn Query>);
        let stemmed_query = or_over_terms(index, vec![schema.stem_en, schema.stem_es], &parsed.normal)?;

        let mut clauses = Vec::new();
        if let Some(q) = basename_query {
            clauses.push((Occur::Should, q));
        }
        if let Some(q) = dirname_query {
            clauses.push((Occur::Should, q));
        }
        if let Some(q) = stemmed_query {
            clauses.push((Occur::Should, q));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(Box::new(BooleanQuery::new(clauses)) as Box<dyn Query>)
        }
    };

    let mut query: Option<Box<dyn Query>> = plus_query;

    if let Some(normal_query) = normal_query {
        query = Some(match query {
            Some(plus) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, plus),
                (Occur::Should, normal_query),
            ])),
            None => normal_query,
        });
    }

    if let Some(minus_query) = minus_query {
        // A minus-only query has nothing to subtract from: `AND_NOT(nothing,
        // minus)` is still nothing, not "everything except the minus hits".
        let left = query.unwrap_or_else(|| Box::new(EmptyQuery));
        query = Some(Box::new(BooleanQuery::new(vec![
            (Occur::Must, left),
            (Occur::MustNot, minus_query),
        ])));
    }

    let Some(mut query) = query else {
        return Ok(Box::new(EmptyQuery));
    };

    if let Some(site_filter) = site_ids_query(schema, site_ids) {
        query = Box::new(BooleanQuery::new(vec![
            (Occur::Must, query),
            (Occur::Must, site_filter),
        ]));
    }
    if let Some(type_filter) = filetype_query(schema, filetype) {
        query = Box::new(BooleanQuery::new(vec![
            (Occur::Must, query),
            (Occur::Must, type_filter),
        ]));
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plus_minus_and_normal_terms() {
        let parsed = split_terms("report +summary -draft final");
        assert!(parsed.plus.contains("summary"));
        assert!(parsed.minus.contains("draft"));
        assert!(parsed.normal.contains("report"));
        assert!(parsed.normal.contains("final"));
    }

    #[test]
    fn bare_plus_or_minus_token_contributes_nothing() {
        let parsed = split_terms("+ - report");
        assert!(parsed.plus.is_empty());
        assert!(parsed.minus.is_empty());
        assert!(parsed.normal.contains("report"));
    }
}
