use crate::core::types::{DocId, Document};

/// One ranked hit: the document id, its score, and a snapshot of the
/// document at evaluation time.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub document: Document,
}

/// Ordered result set: hits sorted by descending score, ties broken by
/// ascending document id.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,
    pub max_score: f64,
    pub took_ms: u64,
}

impl SearchResults {
    pub fn doc_ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|hit| hit.doc_id).collect()
    }
}
