use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};

pub const LOG_FILE_NAME: &str = "transaction.log";

/// Bytes written between fsyncs in `SyncMode::Batch`.
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOperation {
    Add,
    Update,
    Delete,
}

/// One self-delimited record in the log: a single JSON object per line.
/// `document` is absent for deletes. A committed entry is a duplicate of
/// its pending entry with the flag flipped; replay treats only committed
/// entries as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub operation: LogOperation,
    pub timestamp: DateTime<Utc>,
    pub document_id: DocId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    pub committed: bool,
}

/// Fsync policy for appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// fsync after every record.
    #[default]
    Immediate,
    /// Flush per record, fsync every `BATCH_SYNC_BYTES` written.
    Batch,
}

/// Append-only write-ahead log, one per index instance. The log is the
/// authoritative record of intent; the in-memory index is a derived view.
///
/// Internally serialized by its own mutex, distinct from the index lock.
pub struct TransactionLog {
    state: Mutex<LogState>,
}

struct LogState {
    file: File,
    path: PathBuf,
    pending: HashMap<DocId, LogEntry>,
    sync_mode: SyncMode,
    bytes_since_sync: u64,
}

impl TransactionLog {
    /// Creates or opens `transaction.log` in `dir`. The pending map starts
    /// empty; call `recover` to rebuild it from existing records.
    pub fn open(dir: &Path, sync_mode: SyncMode) -> Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(TransactionLog {
            state: Mutex::new(LogState {
                file,
                path,
                pending: HashMap::new(),
                sync_mode,
                bytes_since_sync: 0,
            }),
        })
    }

    /// Appends a pending (uncommitted) entry and tracks it for later
    /// commit or rollback. At most one pending entry may exist per
    /// document id.
    pub fn log_operation(
        &self,
        operation: LogOperation,
        document_id: DocId,
        document: Option<Document>,
    ) -> Result<()> {
        let mut state = self.state.lock();

        if state.pending.contains_key(&document_id) {
            return Err(Error::validation(format!(
                "document {} already has a pending log entry",
                document_id
            )));
        }

        let entry = LogEntry {
            operation,
            timestamp: Utc::now(),
            document_id,
            document,
            committed: false,
        };

        state.append(&entry)?;
        state.pending.insert(document_id, entry);
        Ok(())
    }

    /// Appends a duplicate of the pending entry with `committed=true` and
    /// drops it from the pending map. Fails if nothing is pending for the
    /// id. On a write failure the entry stays pending so the caller can
    /// roll back.
    pub fn commit(&self, document_id: DocId) -> Result<()> {
        let mut state = self.state.lock();

        let mut entry = state
            .pending
            .get(&document_id)
            .cloned()
            .ok_or_else(|| {
                Error::validation(format!("no pending log entry for document {}", document_id))
            })?;
        entry.committed = true;
        entry.timestamp = Utc::now();

        state.append(&entry)?;
        state.pending.remove(&document_id);
        Ok(())
    }

    /// Drops the pending entry without writing a commit record. The
    /// uncommitted record stays on disk; replay ignores it.
    pub fn rollback(&self, document_id: DocId) -> Result<()> {
        let mut state = self.state.lock();
        state.pending.remove(&document_id).ok_or_else(|| {
            Error::validation(format!("no pending log entry for document {}", document_id))
        })?;
        debug!(document_id = document_id.value(), "rolled back pending log entry");
        Ok(())
    }

    /// Re-reads the log from the start, returning every parseable entry in
    /// append order, and rebuilds the pending map: an entry stays pending
    /// unless a later committed entry for the same id follows it.
    ///
    /// Reading stops at the first unparsable line, which is how a torn
    /// trailing write shows up.
    pub fn recover(&self) -> Result<Vec<LogEntry>> {
        let mut state = self.state.lock();

        let file = File::open(&state.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!(error = %err, "discarding torn trailing log record");
                    break;
                }
            }
        }

        state.pending.clear();
        for entry in &entries {
            if entry.committed {
                state.pending.remove(&entry.document_id);
            } else {
                state.pending.insert(entry.document_id, entry.clone());
            }
        }

        debug!(
            entries = entries.len(),
            pending = state.pending.len(),
            "recovered transaction log"
        );
        Ok(entries)
    }

    /// Resets the log to empty and clears the pending map. Called after a
    /// successful replay so subsequent operations start from a clean log.
    pub fn truncate(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.set_len(0)?;
        state.file.sync_all()?;
        state.pending.clear();
        state.bytes_since_sync = 0;
        Ok(())
    }

    /// Flushes buffered records to durable storage.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.flush()?;
        state.file.sync_all()?;
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl LogState {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let mut record = serde_json::to_string(entry)
            .map_err(|e| Error::durability(format!("failed to encode log entry: {}", e)))?;
        record.push('\n');

        self.file.write_all(record.as_bytes())?;
        self.bytes_since_sync += record.len() as u64;

        match self.sync_mode {
            SyncMode::Immediate => {
                self.file.sync_all()?;
                self.bytes_since_sync = 0;
            }
            SyncMode::Batch => {
                self.file.flush()?;
                if self.bytes_since_sync >= BATCH_SYNC_BYTES {
                    self.file.sync_all()?;
                    self.bytes_since_sync = 0;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn doc(text: &str) -> Document {
        let mut d = Document::new();
        d.add_field("content", text);
        d
    }

    #[test]
    fn commit_clears_pending_and_duplicates_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        log.log_operation(LogOperation::Add, DocId(0), Some(doc("hello"))).unwrap();
        assert_eq!(log.pending_count(), 1);
        log.commit(DocId(0)).unwrap();
        assert_eq!(log.pending_count(), 0);

        let entries = log.recover().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].committed);
        assert!(entries[1].committed);
        assert_eq!(entries[0].document_id, entries[1].document_id);
    }

    #[test]
    fn commit_without_pending_fails() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        let err = log.commit(DocId(7)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn rollback_without_pending_fails() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        let err = log.rollback(DocId(7)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn duplicate_pending_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        log.log_operation(LogOperation::Add, DocId(1), Some(doc("a"))).unwrap();
        let err = log
            .log_operation(LogOperation::Update, DocId(1), Some(doc("b")))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn recover_rebuilds_pending_map() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        log.log_operation(LogOperation::Add, DocId(0), Some(doc("committed"))).unwrap();
        log.commit(DocId(0)).unwrap();
        log.log_operation(LogOperation::Add, DocId(1), Some(doc("left pending"))).unwrap();

        // Fresh handle over the same directory, as after a restart.
        let reopened = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();
        let entries = reopened.recover().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(reopened.pending_count(), 1);
    }

    #[test]
    fn recover_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        log.log_operation(LogOperation::Add, DocId(0), Some(doc("x"))).unwrap();
        log.commit(DocId(0)).unwrap();
        log.log_operation(LogOperation::Delete, DocId(5), None).unwrap();

        let first = log.recover().unwrap();
        let second = log.recover().unwrap();
        assert_eq!(first, second);
        assert_eq!(log.pending_count(), 1);
    }

    #[test]
    fn torn_trailing_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();
        log.log_operation(LogOperation::Add, DocId(0), Some(doc("whole"))).unwrap();
        log.commit(DocId(0)).unwrap();
        log.close().unwrap();

        // Simulate a crash mid-append.
        let path = dir.path().join(LOG_FILE_NAME);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"operation\":\"add\",\"time").unwrap();
        drop(file);

        let reopened = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();
        let entries = reopened.recover().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.document_id == DocId(0)));
    }

    #[test]
    fn truncate_resets_log_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Immediate).unwrap();

        log.log_operation(LogOperation::Add, DocId(0), Some(doc("x"))).unwrap();
        log.truncate().unwrap();

        assert_eq!(log.pending_count(), 0);
        assert!(log.recover().unwrap().is_empty());
    }

    #[test]
    fn delete_entries_carry_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path(), SyncMode::Batch).unwrap();

        log.log_operation(LogOperation::Delete, DocId(3), None).unwrap();
        log.commit(DocId(3)).unwrap();
        log.close().unwrap();

        let entries = log.recover().unwrap();
        assert!(entries.iter().all(|e| e.document.is_none()));
        assert_eq!(entries[0].operation, LogOperation::Delete);
    }
}
