use proxima_core::{CoreResult, DocumentId, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::{effective_bound, QueryExecutor};
use crate::binding::Binding;

/// Yields a fixed ascending document list and never produces hits.
pub struct ConstExecutor {
    document_ids: Vec<DocumentId>,
    /// Index of the first id not yet returned.
    cursor: usize,
    latest: DocumentId,
}

impl ConstExecutor {
    pub(crate) fn new(document_ids: Vec<DocumentId>) -> Self {
        Self {
            document_ids,
            cursor: 0,
            latest: UNPOSITIONED,
        }
    }
}

impl QueryExecutor for ConstExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let bound = effective_bound(self.latest, greater_than);
        let remaining = &self.document_ids[self.cursor..];
        self.cursor += remaining.partition_point(|doc| *doc <= bound);

        self.latest = match self.document_ids.get(self.cursor) {
            Some(doc) => {
                self.cursor += 1;
                *doc
            }
            None => NO_MORE_DOCUMENTS,
        };
        Ok(self.latest)
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        Ok(None)
    }

    fn latest_document(&self) -> DocumentId {
        self.latest
    }

    fn close(&mut self) {
        self.latest = NO_MORE_DOCUMENTS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_walks_ids() {
        let mut exec = ConstExecutor::new(vec![1, 4, 9]);
        assert_eq!(exec.next_document(-1).unwrap(), 1);
        assert_eq!(exec.next_hit().unwrap(), None);
        assert_eq!(exec.next_document(1).unwrap(), 4);
        assert_eq!(exec.next_document(5).unwrap(), 9);
        assert_eq!(exec.next_document(9).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(exec.next_document(0).unwrap(), NO_MORE_DOCUMENTS);
    }

    #[test]
    fn test_const_never_rewinds() {
        let mut exec = ConstExecutor::new(vec![1, 4, 9]);
        assert_eq!(exec.next_document(3).unwrap(), 4);
        assert_eq!(exec.next_document(0).unwrap(), 9);
    }

    #[test]
    fn test_empty_const() {
        let mut exec = ConstExecutor::new(Vec::new());
        assert_eq!(exec.next_document(-1).unwrap(), NO_MORE_DOCUMENTS);
    }
}
