//! Document and position identifiers.
//!
//! Document ids are dense, ascending and non-negative. The two negative
//! values below are the only sentinels an executor ever reports.

/// Identifier of an indexed document.
pub type DocumentId = i64;

/// Zero-based token offset of a term occurrence within a document.
pub type Position = i32;

/// Returned by `next_document` once a stream is exhausted.
pub const NO_MORE_DOCUMENTS: DocumentId = -1;

/// Reported as the latest document before the first `next_document` call.
pub const UNPOSITIONED: DocumentId = -2;

/// Returns true for a real (non-sentinel) document id.
#[inline]
#[must_use]
pub const fn is_document(id: DocumentId) -> bool {
    id >= 0
}

/// Converts an optional posting cursor result into the sentinel form.
#[inline]
#[must_use]
pub fn or_exhausted(id: Option<DocumentId>) -> DocumentId {
    id.unwrap_or(NO_MORE_DOCUMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_not_documents() {
        assert!(!is_document(NO_MORE_DOCUMENTS));
        assert!(!is_document(UNPOSITIONED));
        assert!(is_document(0));
    }

    #[test]
    fn test_or_exhausted() {
        assert_eq!(or_exhausted(Some(7)), 7);
        assert_eq!(or_exhausted(None), NO_MORE_DOCUMENTS);
    }
}
