//! Failure modes
//!
//! Tests error handling across the executor tree:
//! 1. Storage failures surface as IndexAccess from the triggering call
//! 2. Malformed queries are rejected before running
//! 3. close() is idempotent and leaves executors exhausted
//! 4. Errors while closing postings are logged, not propagated

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proxima_core::{
    CoreError, CoreResult, DocumentId, IndexReader, Position, PostingIterator, NO_MORE_DOCUMENTS,
};
use proxima_index::MemoryIndex;
use proxima_query::node::{and, annotation, or, phrase, repeats, sequence, term};
use proxima_query::{GapRange, QueryEngine, QueryExecutor};
use tracing_subscriber::EnvFilter;

/// Routes engine logs to the test output; `RUST_LOG=proxima_query=trace`
/// shows pool evictions and suppressed close errors.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Failure injected into every cursor of a [`FlakyIndex`].
#[derive(Clone, Copy)]
enum Failure {
    /// Fails the n-th document advance (0-based) of each cursor.
    Advance(usize),
    /// Fails every positions read.
    Positions,
    /// Fails every close.
    Close,
}

struct FlakyIndex {
    inner: MemoryIndex,
    failure: Failure,
    closes: Arc<AtomicUsize>,
}

impl FlakyIndex {
    fn new(texts: &[&str], failure: Failure) -> Self {
        let inner = MemoryIndex::new("body");
        for text in texts {
            inner.add_text(text);
        }
        Self {
            inner,
            failure,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl IndexReader for FlakyIndex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn document_count(&self) -> u64 {
        self.inner.document_count()
    }

    fn document_size(&self, doc_id: DocumentId) -> CoreResult<i32> {
        self.inner.document_size(doc_id)
    }

    fn is_deleted(&self, doc_id: DocumentId) -> bool {
        self.inner.is_deleted(doc_id)
    }

    fn postings(&self, term: &str) -> CoreResult<Box<dyn PostingIterator>> {
        Ok(Box::new(FlakyPostings {
            inner: self.inner.postings(term)?,
            failure: self.failure,
            advances: 0,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct FlakyPostings {
    inner: Box<dyn PostingIterator>,
    failure: Failure,
    advances: usize,
    closes: Arc<AtomicUsize>,
}

impl FlakyPostings {
    fn advance(&mut self) -> CoreResult<()> {
        let n = self.advances;
        self.advances += 1;
        match self.failure {
            Failure::Advance(at) if at == n => {
                Err(CoreError::index_access("body", "segment read failed"))
            }
            _ => Ok(()),
        }
    }
}

impl PostingIterator for FlakyPostings {
    fn next_document(&mut self) -> CoreResult<Option<DocumentId>> {
        self.advance()?;
        self.inner.next_document()
    }

    fn skip_to(&mut self, target: DocumentId) -> CoreResult<Option<DocumentId>> {
        self.advance()?;
        self.inner.skip_to(target)
    }

    fn positions(&mut self) -> CoreResult<Vec<Position>> {
        match self.failure {
            Failure::Positions => Err(CoreError::index_access("body", "positions unreadable")),
            _ => self.inner.positions(),
        }
    }

    fn close(&mut self) -> CoreResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Close => Err(CoreError::index_access("body", "close failed")),
            _ => self.inner.close(),
        }
    }
}

fn flaky_engine(index: FlakyIndex) -> QueryEngine {
    QueryEngine::builder().with_index(Arc::new(index)).build().unwrap()
}

#[test]
fn test_advance_failure_surfaces_from_next_document() {
    let engine = flaky_engine(FlakyIndex::new(&["a", "a", "a"], Failure::Advance(1)));
    let mut executor = engine.executor(&term("body", "a")).unwrap();

    assert_eq!(executor.next_document(-1).unwrap(), 0);
    let err = executor.next_document(0).unwrap_err();
    assert!(err.is_index_access());
    executor.close();
}

#[test]
fn test_failure_in_nested_child_aborts_search() {
    init_tracing();
    let engine = flaky_engine(FlakyIndex::new(&["a b", "a b", "a b"], Failure::Advance(2)));
    let query = and([phrase([term("body", "a"), term("body", "b")]), term("body", "b")]);
    let err = engine.search(&query).unwrap_err();
    assert!(matches!(err, CoreError::IndexAccess { .. }));
}

#[test]
fn test_positions_failure_surfaces_from_next_hit() {
    let engine = flaky_engine(FlakyIndex::new(&["a"], Failure::Positions));
    let mut executor = engine.executor(&or([term("body", "a")])).unwrap();

    assert_eq!(executor.next_document(-1).unwrap(), 0);
    assert!(executor.next_hit().unwrap_err().is_index_access());
}

#[test]
fn test_positional_operator_fails_while_advancing() {
    // sequence materializes hits while searching for a document
    let engine = flaky_engine(FlakyIndex::new(&["a b"], Failure::Positions));
    let mut executor = engine.executor(&phrase([term("body", "a"), term("body", "b")])).unwrap();
    assert!(executor.next_document(-1).unwrap_err().is_index_access());
}

#[test]
fn test_close_errors_are_suppressed() {
    init_tracing();
    let index = FlakyIndex::new(&["a b", "b"], Failure::Close);
    let closes = Arc::clone(&index.closes);
    let engine = flaky_engine(index);

    let query = and([term("body", "a"), term("body", "b")]);
    assert_eq!(engine.documents(&query).unwrap(), vec![0]);
    // both children were closed despite the first failure
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_is_idempotent_for_every_operator() {
    let index = MemoryIndex::new("body");
    index.add_text("a b a b");
    let engine = QueryEngine::builder().with_index(Arc::new(index)).build().unwrap();

    let queries = [
        term("body", "a"),
        and([term("body", "a"), term("body", "b")]),
        or([term("body", "a"), term("body", "b")]),
        phrase([term("body", "a"), term("body", "b")]),
        repeats(term("body", "a"), 1, 2),
    ];
    for query in &queries {
        let mut executor = engine.executor(query).unwrap();
        assert_eq!(executor.next_document(-1).unwrap(), 0);
        executor.close();
        executor.close();
        assert_eq!(executor.latest_document(), NO_MORE_DOCUMENTS);
        assert_eq!(executor.next_document(-1).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(executor.next_hit().unwrap(), None);
    }
}

#[test]
fn test_malformed_queries_rejected_at_construction() {
    let engine = flaky_engine(FlakyIndex::new(&["a"], Failure::Close));
    let malformed = [
        sequence([term("body", "a"), term("body", "a")], [GapRange::new(2, 1)]),
        repeats(term("body", "a"), 3, 2),
        and([]),
        or([phrase([term("body", "a")]), sequence([term("body", "a")], [GapRange::ADJACENT])]),
        annotation("", []),
    ];
    for query in &malformed {
        let err = engine.executor(query).err().unwrap();
        assert!(matches!(err, CoreError::Configuration(_)), "{} accepted", query);
    }
}
