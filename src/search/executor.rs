use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, FieldValue};
use crate::index::inverted::IndexReader;
use crate::query::ast::{
    BoolQuery, MatchPhraseQuery, PrefixQuery, Query, RangeQuery, RangeValue,
};
use crate::scoring::scorer::TfIdfScorer;
use crate::search::results::{SearchHit, SearchResults};

/// Stateless query executor. Evaluates an internal query tree against an
/// [`IndexReader`], so a whole query runs under a single read-lock
/// acquisition and sees one consistent snapshot.
#[derive(Default)]
pub struct QueryExecutor {
    scorer: TfIdfScorer,
}

impl QueryExecutor {
    pub fn new() -> Self {
        QueryExecutor {
            scorer: TfIdfScorer::new(),
        }
    }

    /// Evaluates `query` and returns ranked hits: score descending, ties
    /// broken by ascending document id.
    pub fn execute(&self, reader: &IndexReader, query: &Query) -> Result<SearchResults> {
        let start = Instant::now();

        let matches = self.evaluate(reader, query)?;

        let mut hits = Vec::with_capacity(matches.len());
        for (doc_id, score) in matches {
            let document = reader.document(doc_id).ok_or_else(|| {
                Error::corruption(format!(
                    "posting references document {} which is not in the index",
                    doc_id
                ))
            })?;
            hits.push(SearchHit {
                doc_id,
                score,
                document: document.clone(),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        let took_ms = start.elapsed().as_millis() as u64;
        debug!(hits = hits.len(), took_ms, "executed query");

        Ok(SearchResults {
            total_hits: hits.len(),
            max_score: hits.first().map(|hit| hit.score).unwrap_or(0.0),
            hits,
            took_ms,
        })
    }

    fn evaluate(&self, reader: &IndexReader, query: &Query) -> Result<HashMap<DocId, f64>> {
        match query {
            Query::Term(q) => Ok(self.score_text(reader, &q.field, &q.value)),
            Query::Match(q) => Ok(self.score_text(reader, &q.field, &q.text)),
            Query::MatchPhrase(q) => self.evaluate_phrase(reader, q),
            Query::MatchAll => Ok(reader.documents().map(|(id, _)| (id, 1.0)).collect()),
            Query::Prefix(q) => Ok(self.evaluate_prefix(reader, q)),
            Query::Range(q) => Ok(evaluate_range(reader, q)),
            Query::Bool(q) => self.evaluate_bool(reader, q),
        }
    }

    /// Analyzes `text` and unions postings across its tokens (OR
    /// semantics), restricted to the clause's field. Scores accumulate
    /// `tf × idf` per token. Term and Match share this path; a text that
    /// analyzes to nothing matches nothing.
    fn score_text(&self, reader: &IndexReader, field: &str, text: &str) -> HashMap<DocId, f64> {
        let mut scores = HashMap::new();
        let total_docs = reader.document_count();

        for token in reader.analyzer().analyze(text) {
            let Some(list) = reader.posting_list(&token.text) else {
                continue;
            };
            let idf = self.scorer.idf(total_docs, list.doc_freq());
            for entry in list.iter() {
                if entry.in_field(field) {
                    *scores.entry(entry.doc_id).or_insert(0.0) +=
                        self.scorer.score(entry.term_freq, idf);
                }
            }
        }

        scores
    }

    /// Match with an adjacency requirement: every phrase token must occur
    /// in the clause's field, and the tokens must appear at consecutive
    /// positions there. Adjacency is checked by re-analyzing the field of
    /// each candidate document.
    fn evaluate_phrase(
        &self,
        reader: &IndexReader,
        query: &MatchPhraseQuery,
    ) -> Result<HashMap<DocId, f64>> {
        let tokens = reader.analyzer().analyze(&query.phrase);
        if tokens.is_empty() {
            return Ok(HashMap::new());
        }
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();

        let mut candidates: Option<HashSet<DocId>> = None;
        for text in &texts {
            let docs: HashSet<DocId> = reader
                .posting_list(text)
                .map(|list| {
                    list.iter()
                        .filter(|entry| entry.in_field(&query.field))
                        .map(|entry| entry.doc_id)
                        .collect()
                })
                .unwrap_or_default();
            candidates = Some(match candidates {
                None => docs,
                Some(prev) => prev.intersection(&docs).copied().collect(),
            });
        }

        let total_docs = reader.document_count();
        let mut scores = HashMap::new();
        for doc_id in candidates.unwrap_or_default() {
            let document = reader.document(doc_id).ok_or_else(|| {
                Error::corruption(format!(
                    "posting references document {} which is not in the index",
                    doc_id
                ))
            })?;
            let Some(FieldValue::Text(value)) = document.fields.get(&query.field) else {
                continue;
            };
            let stream: Vec<String> = reader
                .analyzer()
                .analyze(value)
                .into_iter()
                .map(|t| t.text)
                .collect();
            if !contains_adjacent(&stream, &texts) {
                continue;
            }

            let mut score = 0.0;
            for text in &texts {
                if let Some(list) = reader.posting_list(text) {
                    if let Some(entry) = list.get(doc_id) {
                        let idf = self.scorer.idf(total_docs, list.doc_freq());
                        score += self.scorer.score(entry.term_freq, idf);
                    }
                }
            }
            scores.insert(doc_id, score);
        }

        Ok(scores)
    }

    /// Unions the posting lists of every indexed term starting with the
    /// normalized prefix, restricted to the clause's field.
    fn evaluate_prefix(&self, reader: &IndexReader, query: &PrefixQuery) -> HashMap<DocId, f64> {
        let Some(normalized) = reader.analyzer().analyze(&query.value).into_iter().next() else {
            return HashMap::new();
        };

        let matching: Vec<String> = reader
            .terms_with_prefix(&normalized.text)
            .map(str::to_string)
            .collect();

        let total_docs = reader.document_count();
        let mut scores = HashMap::new();
        for term in matching {
            let Some(list) = reader.posting_list(&term) else {
                continue;
            };
            let idf = self.scorer.idf(total_docs, list.doc_freq());
            for entry in list.iter() {
                if entry.in_field(&query.field) {
                    *scores.entry(entry.doc_id).or_insert(0.0) +=
                        self.scorer.score(entry.term_freq, idf);
                }
            }
        }

        scores
    }

    /// A document is retained iff it appears in every `must` child, every
    /// `filter` child, and no `must_not` child. `should` children add to
    /// the score only, except when `must` and `filter` are both empty, in
    /// which case at least one `should` must match. Child scores sum
    /// across must and should; filter and must_not contribute 0.
    fn evaluate_bool(&self, reader: &IndexReader, query: &BoolQuery) -> Result<HashMap<DocId, f64>> {
        if query.is_empty() {
            return Ok(HashMap::new());
        }

        let mut retained: Option<HashMap<DocId, f64>> = None;

        for child in &query.must {
            let matches = self.evaluate(reader, child)?;
            retained = Some(match retained {
                None => matches,
                Some(acc) => {
                    let mut next = HashMap::new();
                    for (doc_id, score) in acc {
                        if let Some(child_score) = matches.get(&doc_id) {
                            next.insert(doc_id, score + child_score);
                        }
                    }
                    next
                }
            });
        }

        for child in &query.filter {
            let matches = self.evaluate(reader, child)?;
            retained = Some(match retained {
                None => matches.into_keys().map(|doc_id| (doc_id, 0.0)).collect(),
                Some(mut acc) => {
                    acc.retain(|doc_id, _| matches.contains_key(doc_id));
                    acc
                }
            });
        }

        let mut retained = match retained {
            Some(mut acc) => {
                for child in &query.should {
                    let matches = self.evaluate(reader, child)?;
                    for (doc_id, score) in matches {
                        if let Some(total) = acc.get_mut(&doc_id) {
                            *total += score;
                        }
                    }
                }
                acc
            }
            None => {
                // No must and no filter: should children form the
                // candidate set.
                let mut union: HashMap<DocId, f64> = HashMap::new();
                for child in &query.should {
                    for (doc_id, score) in self.evaluate(reader, child)? {
                        *union.entry(doc_id).or_insert(0.0) += score;
                    }
                }
                union
            }
        };

        for child in &query.must_not {
            let matches = self.evaluate(reader, child)?;
            retained.retain(|doc_id, _| !matches.contains_key(doc_id));
        }

        Ok(retained)
    }
}

/// Scans documents, keeping those whose field is numeric or time and lies
/// within the bounds. Documents lacking the field, or holding a text
/// value in it, are silently excluded.
fn evaluate_range(reader: &IndexReader, query: &RangeQuery) -> HashMap<DocId, f64> {
    let mut matches = HashMap::new();
    for (doc_id, document) in reader.documents() {
        let Some(value) = document.fields.get(&query.field) else {
            continue;
        };
        let candidate = match value {
            FieldValue::Integer(i) => RangeValue::Number(*i as f64),
            FieldValue::Float(f) => RangeValue::Number(*f),
            FieldValue::Date(d) => RangeValue::Date(*d),
            FieldValue::Text(_) => continue,
        };
        if range_contains(query, &candidate) {
            matches.insert(doc_id, 1.0);
        }
    }
    matches
}

fn range_contains(range: &RangeQuery, candidate: &RangeValue) -> bool {
    if let Some((bound, strict)) = range.lower() {
        match candidate.compare(&bound) {
            Some(Ordering::Greater) => {}
            Some(Ordering::Equal) if !strict => {}
            _ => return false,
        }
    }
    if let Some((bound, strict)) = range.upper() {
        match candidate.compare(&bound) {
            Some(Ordering::Less) => {}
            Some(Ordering::Equal) if !strict => {}
            _ => return false,
        }
    }
    true
}

/// True when `phrase` occurs as a contiguous subsequence of `stream`.
fn contains_adjacent(stream: &[String], phrase: &[&str]) -> bool {
    if phrase.is_empty() || phrase.len() > stream.len() {
        return false;
    }
    (0..=stream.len() - phrase.len()).any(|start| {
        phrase
            .iter()
            .enumerate()
            .all(|(offset, expected)| stream[start + offset] == *expected)
    })
}
