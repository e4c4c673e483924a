use std::sync::Arc;

use tracing::warn;

use proxima_core::{
    CoreError, CoreResult, DocumentId, IndexReader, Position, PostingIterator, NO_MORE_DOCUMENTS,
    UNPOSITIONED,
};

use super::QueryExecutor;
use crate::binding::Binding;
use crate::engine::QueryEngine;
use crate::node::QueryNode;

/// Leaf executor streaming one term's postings.
pub struct TermExecutor {
    node: Arc<QueryNode>,
    index: Arc<dyn IndexReader>,
    /// `None` once closed.
    postings: Option<Box<dyn PostingIterator>>,
    length: i32,
    latest: DocumentId,
    /// Positions of the current document, loaded on the first `next_hit`.
    positions: Option<std::vec::IntoIter<Position>>,
}

impl TermExecutor {
    pub(crate) fn new(engine: &QueryEngine, node: Arc<QueryNode>) -> CoreResult<Self> {
        let QueryNode::Term {
            index,
            term,
            length,
        } = node.as_ref()
        else {
            return Err(CoreError::configuration(format!(
                "term executor cannot run `{}`",
                node.kind()
            )));
        };

        let reader = engine.index(index)?;
        let postings = reader.postings(term)?;
        let length = *length;

        Ok(Self {
            node,
            index: reader,
            postings: Some(postings),
            length,
            latest: UNPOSITIONED,
            positions: None,
        })
    }
}

impl QueryExecutor for TermExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }
        let Some(postings) = self.postings.as_mut() else {
            return Ok(NO_MORE_DOCUMENTS);
        };
        self.positions = None;

        let mut next = if self.latest >= 0 && greater_than < self.latest {
            postings.next_document()?
        } else {
            postings.skip_to(greater_than.saturating_add(1).max(0))?
        };

        while let Some(doc) = next {
            if !self.index.is_deleted(doc) {
                break;
            }
            next = postings.next_document()?;
        }

        self.latest = next.unwrap_or(NO_MORE_DOCUMENTS);
        Ok(self.latest)
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        if self.latest < 0 {
            return Ok(None);
        }

        if self.positions.is_none() {
            let Some(postings) = self.postings.as_mut() else {
                return Ok(None);
            };
            self.positions = Some(postings.positions()?.into_iter());
        }

        Ok(self
            .positions
            .as_mut()
            .and_then(Iterator::next)
            .map(|position| Binding::new(Arc::clone(&self.node), self.latest, position, self.length)))
    }

    fn latest_document(&self) -> DocumentId {
        self.latest
    }

    fn close(&mut self) {
        if let Some(mut postings) = self.postings.take() {
            if let Err(err) = postings.close() {
                warn!(index = self.index.name(), error = %err, "failed to close postings");
            }
        }
        self.positions = None;
        self.latest = NO_MORE_DOCUMENTS;
    }
}
