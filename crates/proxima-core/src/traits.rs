use crate::annotation::{AnnotationConstraint, AnnotationTerm};
use crate::error::CoreResult;
use crate::ids::{DocumentId, Position};

/// Read access to one named positional index.
///
/// Implementations must support any number of independent cursors: every
/// call to [`IndexReader::postings`] returns a fresh iterator that does not
/// share a read position with any other.
pub trait IndexReader: Send + Sync {
    /// Name under which the index is registered.
    fn name(&self) -> &str;

    /// Returns the number of documents ever added, deleted ones included.
    fn document_count(&self) -> u64;

    /// Returns the length of a document in tokens.
    fn document_size(&self, doc_id: DocumentId) -> CoreResult<i32>;

    /// Returns true when the document was deleted and must not be reported.
    fn is_deleted(&self, doc_id: DocumentId) -> bool;

    /// Opens a posting cursor for `term`.
    ///
    /// A term absent from the index yields an empty cursor, not an error.
    fn postings(&self, term: &str) -> CoreResult<Box<dyn PostingIterator>>;
}

/// Forward-only cursor over the ascending documents containing a term.
pub trait PostingIterator: Send {
    /// Advances to the next document, returning `None` at end of postings.
    fn next_document(&mut self) -> CoreResult<Option<DocumentId>>;

    /// Advances to the first document `>= target`, returning `None` at end of
    /// postings. Never moves backwards.
    fn skip_to(&mut self, target: DocumentId) -> CoreResult<Option<DocumentId>>;

    /// Returns the ascending term positions within the current document.
    fn positions(&mut self) -> CoreResult<Vec<Position>>;

    /// Releases any held readers.
    ///
    /// Default implementation holds nothing and succeeds.
    fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

/// Maps annotation queries onto index terms.
pub trait SemanticResolver: Send + Sync {
    /// Returns every term whose annotation satisfies all `constraints`.
    fn resolve(
        &self,
        annotation_type: &str,
        constraints: &[AnnotationConstraint],
    ) -> CoreResult<Vec<AnnotationTerm>>;
}
