//! In-memory positional inverted index.
//!
//! Serves as the reference posting source for the query engine:
//! - A correctness baseline for executors and their tests
//! - A viable store for small corpora that fit in memory
//! - The corpus generator behind the benchmarks
//!
//! Each posting list is held behind an `Arc` and snapshotted when a cursor is
//! opened, so cursors never observe later additions and never contend with
//! each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use roaring::RoaringTreemap;

use proxima_core::{CoreError, CoreResult, DocumentId, IndexReader, Position, PostingIterator};

/// Postings of one term: ascending documents, each with ascending positions.
#[derive(Debug, Clone, Default)]
struct PostingList {
    entries: Vec<(DocumentId, Vec<Position>)>,
}

#[derive(Debug, Default)]
struct IndexState {
    postings: HashMap<String, Arc<PostingList>>,
    document_sizes: Vec<i32>,
    deleted: RoaringTreemap,
}

/// Positional index held entirely in memory.
///
/// # Example
///
/// ```
/// use proxima_core::IndexReader;
/// use proxima_index::MemoryIndex;
///
/// let index = MemoryIndex::new("body");
/// let doc = index.add_text("the cat sat on the mat");
///
/// let mut postings = index.postings("the").unwrap();
/// assert_eq!(postings.next_document().unwrap(), Some(doc));
/// assert_eq!(postings.positions().unwrap(), vec![0, 4]);
/// ```
pub struct MemoryIndex {
    name: String,
    state: Arc<RwLock<IndexState>>,
}

impl MemoryIndex {
    /// Creates an empty index registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(IndexState::default())),
        }
    }

    /// Appends a document made of `tokens`, returning its id.
    ///
    /// Ids are assigned densely in insertion order starting at 0.
    pub fn add_document<I, S>(&self, tokens: I) -> DocumentId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut occurrences: HashMap<String, Vec<Position>> = HashMap::new();
        let mut size: i32 = 0;
        for token in tokens {
            occurrences
                .entry(token.as_ref().to_owned())
                .or_default()
                .push(size);
            size += 1;
        }

        let mut state = self.state.write();
        let doc_id = state.document_sizes.len() as DocumentId;
        state.document_sizes.push(size);

        for (term, positions) in occurrences {
            let list = state.postings.entry(term).or_default();
            // Copies the list only when a cursor still holds the previous snapshot
            Arc::make_mut(list).entries.push((doc_id, positions));
        }

        doc_id
    }

    /// Tokenizes `text` on whitespace, lowercases it and appends it.
    pub fn add_text(&self, text: &str) -> DocumentId {
        self.add_document(text.split_whitespace().map(str::to_lowercase))
    }

    /// Marks a document deleted. Its postings stay in place.
    pub fn delete_document(&self, doc_id: DocumentId) -> CoreResult<()> {
        let mut state = self.state.write();
        if doc_id < 0 || doc_id as usize >= state.document_sizes.len() {
            return Err(CoreError::index_access(
                &self.name,
                format!("cannot delete unknown document {}", doc_id),
            ));
        }
        state.deleted.insert(doc_id as u64);
        Ok(())
    }

    /// Returns the number of documents not marked deleted.
    #[must_use]
    pub fn live_document_count(&self) -> u64 {
        let state = self.state.read();
        state.document_sizes.len() as u64 - state.deleted.len()
    }

    /// Returns the number of distinct terms.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.state.read().postings.len()
    }
}

impl IndexReader for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn document_count(&self) -> u64 {
        self.state.read().document_sizes.len() as u64
    }

    fn document_size(&self, doc_id: DocumentId) -> CoreResult<i32> {
        let state = self.state.read();
        usize::try_from(doc_id)
            .ok()
            .and_then(|idx| state.document_sizes.get(idx).copied())
            .ok_or_else(|| {
                CoreError::index_access(&self.name, format!("unknown document {}", doc_id))
            })
    }

    fn is_deleted(&self, doc_id: DocumentId) -> bool {
        doc_id >= 0 && self.state.read().deleted.contains(doc_id as u64)
    }

    fn postings(&self, term: &str) -> CoreResult<Box<dyn PostingIterator>> {
        let list = self
            .state
            .read()
            .postings
            .get(term)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(MemoryPostings {
            index_name: self.name.clone(),
            list,
            cursor: None,
        }))
    }
}

/// Cursor over one snapshotted posting list.
struct MemoryPostings {
    index_name: String,
    list: Arc<PostingList>,
    /// Entry the cursor sits on; `None` before the first advance.
    cursor: Option<usize>,
}

impl MemoryPostings {
    fn current(&self) -> Option<DocumentId> {
        self.cursor
            .and_then(|idx| self.list.entries.get(idx))
            .map(|(doc, _)| *doc)
    }
}

impl PostingIterator for MemoryPostings {
    fn next_document(&mut self) -> CoreResult<Option<DocumentId>> {
        let next = self.cursor.map_or(0, |idx| idx + 1);
        self.cursor = Some(next.min(self.list.entries.len()));
        Ok(self.current())
    }

    fn skip_to(&mut self, target: DocumentId) -> CoreResult<Option<DocumentId>> {
        if let Some(doc) = self.current() {
            if doc >= target {
                return Ok(Some(doc));
            }
        }

        let start = self.cursor.unwrap_or(0);
        let tail = &self.list.entries[start.min(self.list.entries.len())..];
        let offset = tail.partition_point(|(doc, _)| *doc < target);
        self.cursor = Some(start + offset);
        Ok(self.current())
    }

    fn positions(&mut self) -> CoreResult<Vec<Position>> {
        self.cursor
            .and_then(|idx| self.list.entries.get(idx))
            .map(|(_, positions)| positions.clone())
            .ok_or_else(|| {
                CoreError::index_access(
                    &self.index_name,
                    "positions requested while cursor is not on a document",
                )
            })
    }
}
