use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use proxima_core::{CoreResult, DocumentId, Position, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::{effective_bound, Executor, QueryExecutor};
use crate::binding::Binding;
use crate::engine::QueryEngine;
use crate::node::QueryNode;

/// Left hits not matched exactly by a right hit.
///
/// When `right` matches a document without positional hits (a document
/// filter), the whole document is subtracted.
pub struct MinusExecutor {
    left: Box<Executor>,
    right: Box<Executor>,
    latest: DocumentId,
    hits: VecDeque<Binding>,
}

impl MinusExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        _node: Arc<QueryNode>,
        left: &Arc<QueryNode>,
        right: &Arc<QueryNode>,
    ) -> CoreResult<Self> {
        Ok(Self {
            left: Box::new(Executor::build(engine, left)?),
            right: Box::new(Executor::build(engine, right)?),
            latest: UNPOSITIONED,
            hits: VecDeque::new(),
        })
    }

    /// Surviving left hits on `doc`, or `None` when the document is removed.
    fn document_hits(&mut self, doc: DocumentId) -> CoreResult<Option<VecDeque<Binding>>> {
        let left = self.left.drain_hits()?;
        if self.right.advance_to(doc)? != doc {
            return Ok(Some(left.into()));
        }

        let right = self.right.drain_hits()?;
        if right.is_empty() || left.is_empty() {
            return Ok(None);
        }

        let subtracted: HashSet<(Position, i32)> =
            right.iter().map(|r| (r.position(), r.length())).collect();
        let kept: VecDeque<Binding> = left
            .into_iter()
            .filter(|hit| !subtracted.contains(&(hit.position(), hit.length())))
            .collect();
        Ok((!kept.is_empty()).then_some(kept))
    }
}

impl QueryExecutor for MinusExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let mut bound = effective_bound(self.latest, greater_than);
        self.hits.clear();
        loop {
            let doc = self.left.next_document(bound)?;
            if doc == NO_MORE_DOCUMENTS {
                self.latest = NO_MORE_DOCUMENTS;
                return Ok(NO_MORE_DOCUMENTS);
            }

            if let Some(hits) = self.document_hits(doc)? {
                self.hits = hits;
                self.latest = doc;
                return Ok(doc);
            }
            bound = doc;
        }
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        Ok(self.hits.pop_front())
    }

    fn latest_document(&self) -> DocumentId {
        self.latest
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.hits.clear();
        self.latest = NO_MORE_DOCUMENTS;
    }
}
