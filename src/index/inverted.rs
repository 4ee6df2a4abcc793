use std::collections::HashMap;
use std::path::Path;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document, FieldValue};
use crate::index::posting::{PostingEntry, PostingList};
use crate::storage::txlog::{LogOperation, SyncMode, TransactionLog};

/// The inverted index: term → posting list plus doc id → document, guarded
/// by a single reader-writer lock. String fields are indexed through the
/// analyzer; mutations are persisted through the transaction log when one
/// is attached.
///
/// Mutations are totally ordered by write-lock acquisition, and the log is
/// written while the index lock is held, so log-and-memory mutate as one
/// atomic unit with respect to other threads.
pub struct InvertedIndex {
    analyzer: Analyzer,
    inner: RwLock<IndexInner>,
}

struct IndexInner {
    terms: HashMap<String, PostingList>,
    documents: HashMap<DocId, Document>,
    next_doc_id: u64,
    doc_count: usize,
    log: Option<TransactionLog>,
    degraded: bool,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        InvertedIndex::new(Analyzer::standard())
    }
}

impl InvertedIndex {
    pub fn new(analyzer: Analyzer) -> Self {
        InvertedIndex {
            analyzer,
            inner: RwLock::new(IndexInner {
                terms: HashMap::new(),
                documents: HashMap::new(),
                next_doc_id: 0,
                doc_count: 0,
                log: None,
                degraded: false,
            }),
        }
    }

    /// Builds an index from a configuration, attaching and replaying the
    /// transaction log when one is configured.
    pub fn open(analyzer: Analyzer, config: IndexConfig) -> Result<Self> {
        let index = InvertedIndex::new(analyzer);
        if let Some(dir) = &config.log_dir {
            index.init_transaction_log_with(dir, config.sync_mode)?;
        }
        Ok(index)
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Adds a document: assigns the next id, appends a pending `add` log
    /// entry, updates postings, commits. Returns the assigned id.
    pub fn add(&self, document: Document) -> Result<DocId> {
        let mut inner = self.inner.write();
        inner.check_writable()?;

        let doc_id = DocId(inner.next_doc_id);
        let mut document = document;
        document.id = Some(doc_id);

        let logged = match &inner.log {
            Some(log) => log.log_operation(LogOperation::Add, doc_id, Some(document.clone())),
            None => Ok(()),
        };
        if let Err(err) = logged {
            return Err(inner.note_log_failure(err));
        }

        let postings = build_postings(&self.analyzer, doc_id, &document);
        inner.apply_postings(postings);
        inner.documents.insert(doc_id, document);
        inner.next_doc_id += 1;
        inner.doc_count += 1;

        let committed = match &inner.log {
            Some(log) => log.commit(doc_id),
            None => Ok(()),
        };
        if let Err(err) = committed {
            // Undo the in-memory change; the uncommitted record on disk is
            // ignored by replay.
            inner.remove_postings(doc_id);
            inner.documents.remove(&doc_id);
            inner.next_doc_id -= 1;
            inner.doc_count -= 1;
            if let Some(log) = &inner.log {
                let _ = log.rollback(doc_id);
            }
            return Err(inner.note_log_failure(err));
        }

        debug!(doc_id = doc_id.value(), "added document");
        Ok(doc_id)
    }

    /// Replaces the document under `doc_id`: removes its prior postings,
    /// indexes the new content, commits. Fails with `NotFound` for an
    /// unknown id.
    pub fn update(&self, doc_id: DocId, document: Document) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_writable()?;

        let old_document = inner
            .documents
            .get(&doc_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {} not found", doc_id)))?;

        let mut document = document;
        document.id = Some(doc_id);

        let logged = match &inner.log {
            Some(log) => log.log_operation(LogOperation::Update, doc_id, Some(document.clone())),
            None => Ok(()),
        };
        if let Err(err) = logged {
            return Err(inner.note_log_failure(err));
        }

        inner.remove_postings(doc_id);
        let postings = build_postings(&self.analyzer, doc_id, &document);
        inner.apply_postings(postings);
        inner.documents.insert(doc_id, document);

        let committed = match &inner.log {
            Some(log) => log.commit(doc_id),
            None => Ok(()),
        };
        if let Err(err) = committed {
            inner.remove_postings(doc_id);
            let old_postings = build_postings(&self.analyzer, doc_id, &old_document);
            inner.apply_postings(old_postings);
            inner.documents.insert(doc_id, old_document);
            if let Some(log) = &inner.log {
                let _ = log.rollback(doc_id);
            }
            return Err(inner.note_log_failure(err));
        }

        debug!(doc_id = doc_id.value(), "updated document");
        Ok(())
    }

    /// Removes the document and every posting that references it. Fails
    /// with `NotFound` for an unknown id.
    pub fn delete(&self, doc_id: DocId) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_writable()?;

        let old_document = inner
            .documents
            .get(&doc_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {} not found", doc_id)))?;

        let logged = match &inner.log {
            Some(log) => log.log_operation(LogOperation::Delete, doc_id, None),
            None => Ok(()),
        };
        if let Err(err) = logged {
            return Err(inner.note_log_failure(err));
        }

        inner.remove_postings(doc_id);
        inner.documents.remove(&doc_id);
        inner.doc_count -= 1;

        let committed = match &inner.log {
            Some(log) => log.commit(doc_id),
            None => Ok(()),
        };
        if let Err(err) = committed {
            let old_postings = build_postings(&self.analyzer, doc_id, &old_document);
            inner.apply_postings(old_postings);
            inner.documents.insert(doc_id, old_document);
            inner.doc_count += 1;
            if let Some(log) = &inner.log {
                let _ = log.rollback(doc_id);
            }
            return Err(inner.note_log_failure(err));
        }

        debug!(doc_id = doc_id.value(), "deleted document");
        Ok(())
    }

    /// Returns a clone of the stored document.
    pub fn get_document(&self, doc_id: DocId) -> Result<Document> {
        let inner = self.inner.read();
        inner
            .documents
            .get(&doc_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {} not found", doc_id)))
    }

    /// Analyzes `term` and returns the posting list for the first resulting
    /// token, or an empty list when analysis yields nothing or the term is
    /// absent.
    pub fn get_posting_list(&self, term: &str) -> PostingList {
        let inner = self.inner.read();
        match self.analyzer.analyze(term).first() {
            Some(token) => inner.terms.get(&token.text).cloned().unwrap_or_default(),
            None => PostingList::new(),
        }
    }

    /// Occurrences of `term` in `doc_id`; 0 when either is absent.
    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> u32 {
        let inner = self.inner.read();
        let Some(token) = self.analyzer.analyze(term).into_iter().next() else {
            return 0;
        };
        inner
            .terms
            .get(&token.text)
            .and_then(|list| list.get(doc_id))
            .map(|entry| entry.term_freq)
            .unwrap_or(0)
    }

    /// Number of documents containing `term`; 0 when absent.
    pub fn document_frequency(&self, term: &str) -> usize {
        let inner = self.inner.read();
        let Some(token) = self.analyzer.analyze(term).into_iter().next() else {
            return 0;
        };
        inner.terms.get(&token.text).map(|l| l.doc_freq()).unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().doc_count
    }

    /// Renumbers document ids densely from 0 in ascending old-id order,
    /// without changing document content or term frequencies. Holds the
    /// write lock throughout, so readers never observe a partial
    /// renumbering. With a log attached the log is rewritten so replay
    /// reproduces the renumbered state.
    pub fn optimize(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_writable()?;

        let mut old_ids: Vec<DocId> = inner.documents.keys().copied().collect();
        old_ids.sort();
        let mapping: HashMap<DocId, DocId> = old_ids
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, DocId(new as u64)))
            .collect();

        let old_documents = std::mem::take(&mut inner.documents);
        for (old_id, mut document) in old_documents {
            let new_id = mapping[&old_id];
            document.id = Some(new_id);
            inner.documents.insert(new_id, document);
        }

        let old_terms = std::mem::take(&mut inner.terms);
        for (term, list) in old_terms {
            let mut renumbered = PostingList::new();
            for (old_id, mut entry) in list.postings {
                entry.doc_id = mapping[&old_id];
                renumbered.upsert(entry);
            }
            if !renumbered.is_empty() {
                inner.terms.insert(term, renumbered);
            }
        }

        inner.next_doc_id = inner.documents.len() as u64;

        // Previously committed log records carry the old ids; rewrite the
        // log under the new numbering so replay stays faithful.
        if inner.log.is_some() {
            let rewrite = inner.rewrite_log();
            if let Err(err) = rewrite {
                return Err(inner.note_log_failure(err));
            }
        }

        info!(documents = inner.doc_count, "optimized index");
        Ok(())
    }

    /// Attaches a transaction log in `dir`, replays its committed entries
    /// into memory, and truncates it. Call before any mutation when
    /// durability is wanted. Uses per-entry fsync; see
    /// [`InvertedIndex::init_transaction_log_with`] for the batched policy.
    pub fn init_transaction_log(&self, dir: &Path) -> Result<()> {
        self.init_transaction_log_with(dir, SyncMode::Immediate)
    }

    pub fn init_transaction_log_with(&self, dir: &Path, sync_mode: SyncMode) -> Result<()> {
        let mut inner = self.inner.write();

        let log = TransactionLog::open(dir, sync_mode)?;
        let entries = log.recover()?;

        inner.terms.clear();
        inner.documents.clear();
        inner.doc_count = 0;
        inner.next_doc_id = 0;

        let mut replayed = 0usize;
        for entry in entries {
            if !entry.committed {
                continue;
            }
            let result = inner.replay_entry(&self.analyzer, entry);
            if let Err(err) = result {
                // Replay hit an invariant violation that is not a torn
                // tail: refuse to serve from this state.
                inner.terms.clear();
                inner.documents.clear();
                inner.doc_count = 0;
                inner.next_doc_id = 0;
                inner.degraded = true;
                return Err(err);
            }
            replayed += 1;
        }

        inner.doc_count = inner.documents.len();
        inner.next_doc_id = inner
            .documents
            .keys()
            .max()
            .map(|id| id.value() + 1)
            .unwrap_or(0);

        log.truncate()?;
        inner.log = Some(log);

        info!(
            replayed,
            documents = inner.doc_count,
            "replayed transaction log"
        );
        Ok(())
    }

    /// Flushes and closes the transaction log, if one is attached.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(log) = inner.log.take() {
            log.close()?;
        }
        Ok(())
    }

    /// Takes the shared lock for the lifetime of the returned reader. The
    /// query executor evaluates a whole tree against one reader, so a
    /// query sees a single consistent snapshot.
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            guard: self.inner.read(),
            analyzer: &self.analyzer,
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let inner = self.inner.read();
        assert_eq!(inner.doc_count, inner.documents.len());
        for (term, list) in &inner.terms {
            assert!(!list.is_empty(), "term '{}' kept with empty postings", term);
            for entry in list.iter() {
                assert!(
                    inner.documents.contains_key(&entry.doc_id),
                    "posting for '{}' references missing document {}",
                    term,
                    entry.doc_id
                );
            }
        }
        if let Some(max) = inner.documents.keys().max() {
            assert!(inner.next_doc_id > max.value());
        }
    }
}

/// Read-locked view of the index used by the query executor.
pub struct IndexReader<'a> {
    guard: RwLockReadGuard<'a, IndexInner>,
    analyzer: &'a Analyzer,
}

impl IndexReader<'_> {
    pub fn analyzer(&self) -> &Analyzer {
        self.analyzer
    }

    pub fn posting_list(&self, term: &str) -> Option<&PostingList> {
        self.guard.terms.get(term)
    }

    pub fn terms_with_prefix<'s>(&'s self, prefix: &'s str) -> impl Iterator<Item = &'s str> {
        self.guard
            .terms
            .keys()
            .filter(move |term| term.starts_with(prefix))
            .map(String::as_str)
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.guard.documents.get(&doc_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.guard.documents.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn document_count(&self) -> usize {
        self.guard.doc_count
    }
}

impl IndexInner {
    fn check_writable(&self) -> Result<()> {
        if self.degraded {
            return Err(Error::durability(
                "index is degraded; mutations are refused until restart",
            ));
        }
        Ok(())
    }

    fn note_log_failure(&mut self, err: Error) -> Error {
        if matches!(err.kind, ErrorKind::Durability) {
            self.degraded = true;
        }
        err
    }

    fn apply_postings(&mut self, postings: HashMap<String, PostingEntry>) {
        for (term, entry) in postings {
            self.terms.entry(term).or_default().upsert(entry);
        }
    }

    fn remove_postings(&mut self, doc_id: DocId) {
        self.terms.retain(|_, list| {
            list.remove(doc_id);
            !list.is_empty()
        });
    }

    fn replay_entry(
        &mut self,
        analyzer: &Analyzer,
        entry: crate::storage::txlog::LogEntry,
    ) -> Result<()> {
        let doc_id = entry.document_id;
        match entry.operation {
            LogOperation::Add => {
                if self.documents.contains_key(&doc_id) {
                    return Err(Error::corruption(format!(
                        "replayed add for already-present document {}",
                        doc_id
                    )));
                }
                let mut document = entry.document.ok_or_else(|| {
                    Error::corruption(format!("add entry for document {} has no snapshot", doc_id))
                })?;
                document.id = Some(doc_id);
                let postings = build_postings(analyzer, doc_id, &document);
                self.apply_postings(postings);
                self.documents.insert(doc_id, document);
            }
            LogOperation::Update => {
                if !self.documents.contains_key(&doc_id) {
                    return Err(Error::corruption(format!(
                        "replayed update for missing document {}",
                        doc_id
                    )));
                }
                let mut document = entry.document.ok_or_else(|| {
                    Error::corruption(format!(
                        "update entry for document {} has no snapshot",
                        doc_id
                    ))
                })?;
                document.id = Some(doc_id);
                self.remove_postings(doc_id);
                let postings = build_postings(analyzer, doc_id, &document);
                self.apply_postings(postings);
                self.documents.insert(doc_id, document);
            }
            LogOperation::Delete => {
                if self.documents.remove(&doc_id).is_none() {
                    return Err(Error::corruption(format!(
                        "replayed delete for missing document {}",
                        doc_id
                    )));
                }
                self.remove_postings(doc_id);
            }
        }
        Ok(())
    }

    /// Truncates the log and re-records every live document as a committed
    /// add under its current id.
    fn rewrite_log(&mut self) -> Result<()> {
        let Some(log) = self.log.as_ref() else {
            return Ok(());
        };
        log.truncate()?;

        let mut ids: Vec<DocId> = self.documents.keys().copied().collect();
        ids.sort();
        for doc_id in ids {
            let document = self.documents[&doc_id].clone();
            log.log_operation(LogOperation::Add, doc_id, Some(document))?;
            log.commit(doc_id)?;
        }
        Ok(())
    }
}

/// Builds the per-term posting entries for one document. All string fields
/// contribute to the same per-document frequency for a given term; fields
/// are visited in sorted name order so positions are deterministic and
/// monotonically increasing within each field.
fn build_postings(
    analyzer: &Analyzer,
    doc_id: DocId,
    document: &Document,
) -> HashMap<String, PostingEntry> {
    let mut postings: HashMap<String, PostingEntry> = HashMap::new();

    let mut field_names: Vec<&String> = document.fields.keys().collect();
    field_names.sort();

    for name in field_names {
        if let Some(FieldValue::Text(text)) = document.fields.get(name) {
            for token in analyzer.analyze(text) {
                postings
                    .entry(token.text)
                    .or_insert_with(|| PostingEntry::new(doc_id))
                    .record(token.position, name);
            }
        }
    }

    postings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::txlog::{LogOperation, SyncMode, TransactionLog};
    use chrono::Utc;

    fn doc(fields: &[(&str, &str)]) -> Document {
        let mut d = Document::new();
        for (name, value) in fields {
            d.add_field(*name, *value);
        }
        d
    }

    #[test]
    fn indexing_and_term_lookup() {
        let index = InvertedIndex::default();
        let d1 = index
            .add(doc(&[
                ("title", "The quick brown fox"),
                ("content", "jumps over the lazy dog"),
            ]))
            .unwrap();
        let d2 = index
            .add(doc(&[
                ("title", "Quick brown foxes"),
                ("content", "are quick and brown"),
            ]))
            .unwrap();

        assert_eq!(index.term_frequency("quick", d1), 1);
        assert_eq!(index.term_frequency("quick", d2), 2);
        assert_eq!(index.document_frequency("quick"), 2);
        assert_eq!(index.document_frequency("fox"), 1);
        assert_eq!(index.document_frequency("foxes"), 1);
        index.assert_invariants();
    }

    #[test]
    fn term_frequency_aggregates_across_fields() {
        let index = InvertedIndex::default();
        let id = index
            .add(doc(&[("title", "rust rust"), ("content", "rust")]))
            .unwrap();

        assert_eq!(index.term_frequency("rust", id), 3);
        let list = index.get_posting_list("rust");
        let entry = list.get(id).unwrap();
        assert!(entry.in_field("title"));
        assert!(entry.in_field("content"));
    }

    #[test]
    fn added_document_round_trips_exactly() {
        let index = InvertedIndex::default();
        let now = Utc::now();
        let mut d = Document::new();
        d.add_field("title", "hello");
        d.add_field("year", 2021_i64);
        d.add_field("rating", 3.25_f64);
        d.add_field("published", now);

        let id = index.add(d.clone()).unwrap();
        let fetched = index.get_document(id).unwrap();

        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.get_field("title").unwrap(), &FieldValue::Text("hello".into()));
        assert_eq!(fetched.get_field("year").unwrap(), &FieldValue::Integer(2021));
        assert_eq!(fetched.get_field("rating").unwrap(), &FieldValue::Float(3.25));
        assert_eq!(fetched.get_field("published").unwrap(), &FieldValue::Date(now));
    }

    #[test]
    fn ids_are_assigned_strictly_increasing() {
        let index = InvertedIndex::default();
        let a = index.add(doc(&[("t", "one")])).unwrap();
        let b = index.add(doc(&[("t", "two")])).unwrap();
        let c = index.add(doc(&[("t", "three")])).unwrap();
        assert!(a < b && b < c);
        assert_eq!(a, DocId(0));
    }

    #[test]
    fn update_replaces_postings() {
        let index = InvertedIndex::default();
        let id = index.add(doc(&[("content", "rust search engine")])).unwrap();

        index.update(id, doc(&[("content", "golang indexer")])).unwrap();

        assert_eq!(index.term_frequency("rust", id), 0);
        assert_eq!(index.document_frequency("search"), 0);
        assert_eq!(index.term_frequency("golang", id), 1);
        assert_eq!(index.document_count(), 1);
        index.assert_invariants();
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let index = InvertedIndex::default();
        let err = index.update(DocId(42), doc(&[("t", "x")])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn delete_removes_document_and_postings() {
        let index = InvertedIndex::default();
        let keep = index.add(doc(&[("content", "shared unique1")])).unwrap();
        let gone = index.add(doc(&[("content", "shared unique2")])).unwrap();

        index.delete(gone).unwrap();

        assert_eq!(index.document_count(), 1);
        assert_eq!(index.document_frequency("shared"), 1);
        assert_eq!(index.document_frequency("unique2"), 0);
        assert_eq!(index.term_frequency("unique2", gone), 0);
        assert!(index.get_document(gone).is_err());
        assert!(index.get_document(keep).is_ok());
        index.assert_invariants();
    }

    #[test]
    fn delete_after_add_is_observably_absent() {
        let index = InvertedIndex::default();
        let id = index.add(doc(&[("content", "ephemeral words here")])).unwrap();
        index.delete(id).unwrap();

        assert_eq!(index.document_count(), 0);
        assert_eq!(index.document_frequency("ephemeral"), 0);
        assert!(index.get_posting_list("words").is_empty());
        index.assert_invariants();
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let index = InvertedIndex::default();
        let err = index.delete(DocId(9)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn get_posting_list_analyzes_its_argument() {
        let index = InvertedIndex::default();
        let id = index.add(doc(&[("content", "tokenized value")])).unwrap();

        // Query-time normalization matches index-time normalization.
        let list = index.get_posting_list("TOKENIZED!");
        assert_eq!(list.doc_freq(), 1);
        assert!(list.get(id).is_some());

        assert!(index.get_posting_list("   ").is_empty());
        assert!(index.get_posting_list("absent").is_empty());
    }

    #[test]
    fn optimize_renumbers_densely_without_changing_content() {
        let index = InvertedIndex::default();
        let a = index.add(doc(&[("content", "alpha common")])).unwrap();
        let b = index.add(doc(&[("content", "beta common")])).unwrap();
        let c = index.add(doc(&[("content", "gamma common")])).unwrap();
        index.delete(b).unwrap();

        index.optimize().unwrap();

        assert_eq!(index.document_count(), 2);
        assert_eq!(index.document_frequency("common"), 2);
        // Dense ids from 0, in ascending old-id order.
        let first = index.get_document(DocId(0)).unwrap();
        let second = index.get_document(DocId(1)).unwrap();
        assert_eq!(first.get_field("content").unwrap(), &FieldValue::Text("alpha common".into()));
        assert_eq!(second.get_field("content").unwrap(), &FieldValue::Text("gamma common".into()));
        assert_eq!(index.term_frequency("gamma", DocId(1)), 1);
        assert!(index.get_document(DocId(2)).is_err());
        let _ = (a, c);
        index.assert_invariants();

        // New ids continue from the dense range.
        let next = index.add(doc(&[("content", "delta")])).unwrap();
        assert_eq!(next, DocId(2));
    }

    #[test]
    fn replay_restores_committed_state() {
        let dir = tempfile::tempdir().unwrap();

        let index = InvertedIndex::default();
        index.init_transaction_log(dir.path()).unwrap();
        let d1 = index.add(doc(&[("title", "durable one")])).unwrap();
        let d2 = index.add(doc(&[("title", "durable two")])).unwrap();
        index.update(d2, doc(&[("title", "durable two revised")])).unwrap();
        index.close().unwrap();

        let reopened = InvertedIndex::default();
        reopened.init_transaction_log(dir.path()).unwrap();

        assert_eq!(reopened.document_count(), 2);
        assert_eq!(reopened.document_frequency("durable"), 2);
        assert_eq!(reopened.term_frequency("revised", d2), 1);
        assert_eq!(
            reopened.get_document(d1).unwrap().get_field("title").unwrap(),
            &FieldValue::Text("durable one".into())
        );
        reopened.assert_invariants();
    }

    #[test]
    fn uncommitted_entry_is_not_replayed() {
        let dir = tempfile::tempdir().unwrap();

        // D1 committed through the index.
        let index = InvertedIndex::default();
        index.init_transaction_log(dir.path()).unwrap();
        index.add(doc(&[("title", "survives the crash")])).unwrap();
        index.close().unwrap();

        // D2's pending entry reaches the log, but the process dies before
        // the commit record is written.
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();
        log.log_operation(LogOperation::Add, DocId(1), Some(doc(&[("title", "lost")])))
            .unwrap();
        log.close().unwrap();
        drop(log);

        let reopened = InvertedIndex::default();
        reopened.init_transaction_log(dir.path()).unwrap();

        assert_eq!(reopened.document_count(), 1);
        assert!(reopened.get_document(DocId(0)).is_ok());
        assert!(reopened.get_document(DocId(1)).is_err());
        assert_eq!(reopened.document_frequency("lost"), 0);
        reopened.assert_invariants();
    }

    #[test]
    fn deletes_replay_too() {
        let dir = tempfile::tempdir().unwrap();

        let index = InvertedIndex::default();
        index.init_transaction_log(dir.path()).unwrap();
        let d1 = index.add(doc(&[("t", "kept")])).unwrap();
        let d2 = index.add(doc(&[("t", "removed")])).unwrap();
        index.delete(d2).unwrap();
        index.close().unwrap();

        let reopened = InvertedIndex::default();
        reopened.init_transaction_log(dir.path()).unwrap();

        assert_eq!(reopened.document_count(), 1);
        assert!(reopened.get_document(d1).is_ok());
        assert!(reopened.get_document(d2).is_err());
        // next_doc_id restarts above the surviving maximum.
        let next = reopened.add(doc(&[("t", "fresh")])).unwrap();
        assert_eq!(next, DocId(1));
        reopened.assert_invariants();
    }

    #[test]
    fn replay_of_corrupt_log_refuses_mutations() {
        let dir = tempfile::tempdir().unwrap();

        // A committed delete for a document that never existed.
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();
        log.log_operation(LogOperation::Delete, DocId(3), None).unwrap();
        log.commit(DocId(3)).unwrap();
        log.close().unwrap();
        drop(log);

        let index = InvertedIndex::default();
        let err = index.init_transaction_log(dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corruption);

        let err = index.add(doc(&[("t", "refused")])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Durability);
    }

    #[test]
    fn optimize_rewrites_log_for_faithful_replay() {
        let dir = tempfile::tempdir().unwrap();

        let index = InvertedIndex::default();
        index.init_transaction_log(dir.path()).unwrap();
        index.add(doc(&[("t", "first")])).unwrap();
        let middle = index.add(doc(&[("t", "second")])).unwrap();
        index.add(doc(&[("t", "third")])).unwrap();
        index.delete(middle).unwrap();
        index.optimize().unwrap();
        index.close().unwrap();

        let reopened = InvertedIndex::default();
        reopened.init_transaction_log(dir.path()).unwrap();

        assert_eq!(reopened.document_count(), 2);
        assert_eq!(reopened.term_frequency("first", DocId(0)), 1);
        assert_eq!(reopened.term_frequency("third", DocId(1)), 1);
        reopened.assert_invariants();
    }

    #[test]
    fn concurrent_readers_during_writes() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(InvertedIndex::default());
        for i in 0..50 {
            index.add(doc(&[("content", &format!("shared word{}", i))])).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let idx = Arc::clone(&index);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let df = idx.document_frequency("shared");
                    assert!(df >= 50);
                    let _ = idx.document_count();
                }
            }));
        }
        let writer = {
            let idx = Arc::clone(&index);
            thread::spawn(move || {
                for i in 50..100 {
                    idx.add(doc(&[("content", &format!("shared word{}", i))])).unwrap();
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        writer.join().unwrap();

        assert_eq!(index.document_count(), 100);
        assert_eq!(index.document_frequency("shared"), 100);
        index.assert_invariants();
    }
}
