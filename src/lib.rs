//! lucerne is an embedded, in-memory full-text search engine.
//!
//! The engine keeps an inverted index over structured documents and serves
//! queries written in a JSON DSL. Mutations are made durable through an
//! append-only write-ahead transaction log that is replayed on startup.
//!
//! Layering, leaf first:
//!
//! - [`analysis`]: whitespace tokenization plus an ordered word-level
//!   filter chain, producing positional tokens. The same analyzer runs at
//!   indexing and at query time.
//! - [`core`]: documents with typed fields, ids, and the crate error type.
//! - [`storage`]: the transaction log: line-oriented JSON records with
//!   pending/commit/rollback semantics and torn-tail-tolerant recovery.
//! - [`index`]: the inverted index itself: posting lists, the document
//!   store, and the add/update/delete/optimize lifecycle behind one
//!   reader-writer lock.
//! - [`query`]: the internal query tree and the DSL parser that lowers
//!   JSON into it.
//! - [`scoring`] and [`search`]: TF-IDF scoring and the executor that
//!   evaluates a query tree into ranked hits.
//!
//! ```
//! use lucerne::core::types::Document;
//! use lucerne::index::inverted::InvertedIndex;
//! use lucerne::query::parser::DslParser;
//! use lucerne::search::executor::QueryExecutor;
//!
//! let index = InvertedIndex::default();
//! let mut doc = Document::new();
//! doc.add_field("title", "the quick brown fox");
//! index.add(doc).unwrap();
//!
//! let query = DslParser::new()
//!     .parse(br#"{"query": {"match": {"title": "quick"}}}"#)
//!     .unwrap();
//! let results = QueryExecutor::new().execute(&index.reader(), &query).unwrap();
//! assert_eq!(results.total_hits, 1);
//! ```

pub mod analysis;
pub mod core;
pub mod index;
pub mod query;
pub mod scoring;
pub mod search;
pub mod storage;
