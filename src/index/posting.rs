use std::collections::{HashMap, HashSet};

use crate::core::types::DocId;

/// Occurrence record for one (term, document) pair: frequency aggregated
/// across all string fields, token positions, and the fields the term
/// appeared in. `term_freq == positions.len()` whenever positions are
/// recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingEntry {
    pub doc_id: DocId,
    pub term_freq: u32,
    pub positions: Vec<u32>,
    pub fields: HashSet<String>,
}

impl PostingEntry {
    pub fn new(doc_id: DocId) -> Self {
        PostingEntry {
            doc_id,
            term_freq: 0,
            positions: Vec::new(),
            fields: HashSet::new(),
        }
    }

    pub fn record(&mut self, position: u32, field: &str) {
        self.term_freq += 1;
        self.positions.push(position);
        if !self.fields.contains(field) {
            self.fields.insert(field.to_string());
        }
    }

    pub fn in_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// All postings for a single term, keyed by document id. Document
/// frequency is the posting count; a list that empties is removed from
/// the index entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    pub postings: HashMap<DocId, PostingEntry>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: HashMap::new(),
        }
    }

    pub fn upsert(&mut self, entry: PostingEntry) {
        self.postings.insert(entry.doc_id, entry);
    }

    pub fn get(&self, doc_id: DocId) -> Option<&PostingEntry> {
        self.postings.get(&doc_id)
    }

    pub fn remove(&mut self, doc_id: DocId) -> Option<PostingEntry> {
        self.postings.remove(&doc_id)
    }

    /// Number of documents containing this term.
    pub fn doc_freq(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostingEntry> {
        self.postings.values()
    }
}
