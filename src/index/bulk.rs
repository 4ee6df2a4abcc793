use crate::core::error::Result;
use crate::core::types::{DocId, Document};
use crate::index::inverted::InvertedIndex;

/// One verb in a bulk request.
#[derive(Debug, Clone)]
pub enum BulkOperation {
    Add(Document),
    Update(DocId, Document),
    Delete(DocId),
}

/// Per-operation outcome of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkStatus {
    Added(DocId),
    Updated(DocId),
    Deleted(DocId),
}

impl InvertedIndex {
    /// Applies a sequence of verbs, each under its own lock acquisition.
    /// There is no cross-verb atomicity: a failure in one operation does
    /// not undo or stop the others.
    pub fn bulk(&self, operations: Vec<BulkOperation>) -> Vec<Result<BulkStatus>> {
        operations
            .into_iter()
            .map(|op| match op {
                BulkOperation::Add(document) => self.add(document).map(BulkStatus::Added),
                BulkOperation::Update(doc_id, document) => {
                    self.update(doc_id, document).map(|_| BulkStatus::Updated(doc_id))
                }
                BulkOperation::Delete(doc_id) => {
                    self.delete(doc_id).map(|_| BulkStatus::Deleted(doc_id))
                }
            })
            .collect()
    }
}
