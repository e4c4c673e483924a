use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

use proxima_core::{CoreResult, DocumentId, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::{effective_bound, QueryExecutor};
use crate::binding::{rewrap, Binding};
use crate::engine::QueryEngine;
use crate::node::QueryNode;
use crate::pool::ExecutorPool;

/// Union of its children: a k-way merge over document ids.
///
/// Children are driven through an [`ExecutorPool`], so only a bounded number
/// of them are materialized at once.
pub struct OrExecutor {
    node: Arc<QueryNode>,
    pool: ExecutorPool,
    /// `(document, slot)` of every child not yet exhausted.
    queue: BinaryHeap<Reverse<(DocumentId, usize)>>,
    started: bool,
    capture: bool,
    latest: DocumentId,
    hits: Option<VecDeque<Binding>>,
}

impl OrExecutor {
    /// Every child tree is validated up front; child executors are built on
    /// first use.
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        children: Vec<Arc<QueryNode>>,
    ) -> CoreResult<Self> {
        for child in &children {
            child.validate()?;
        }
        Ok(Self {
            node,
            pool: ExecutorPool::new(engine, children),
            queue: BinaryHeap::new(),
            started: false,
            capture: engine.capture_sub_bindings(),
            latest: UNPOSITIONED,
            hits: None,
        })
    }

    fn document_hits(&mut self) -> CoreResult<VecDeque<Binding>> {
        let mut slots: Vec<usize> = self
            .queue
            .iter()
            .filter(|Reverse((doc, _))| *doc == self.latest)
            .map(|Reverse((_, slot))| *slot)
            .collect();
        slots.sort_unstable();

        let mut hits = Vec::new();
        for slot in slots {
            while let Some(hit) = self.pool.next_hit(slot)? {
                hits.push(rewrap(&self.node, &hit, hit.length(), self.capture));
            }
        }
        hits.sort_by_key(|h| (h.position(), h.length()));
        Ok(hits.into())
    }
}

impl QueryExecutor for OrExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }
        let bound = effective_bound(self.latest, greater_than);
        self.hits = None;

        if !self.started {
            self.started = true;
            for slot in 0..self.pool.len() {
                let doc = self.pool.next_document(slot, bound)?;
                if doc >= 0 {
                    self.queue.push(Reverse((doc, slot)));
                }
            }
        } else {
            while let Some(&Reverse((doc, slot))) = self.queue.peek() {
                if doc > bound {
                    break;
                }
                self.queue.pop();
                let next = self.pool.next_document(slot, bound)?;
                if next >= 0 {
                    self.queue.push(Reverse((next, slot)));
                }
            }
        }

        self.latest = match self.queue.peek() {
            Some(Reverse((doc, _))) => *doc,
            None => {
                self.pool.close();
                NO_MORE_DOCUMENTS
            }
        };
        Ok(self.latest)
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        if self.latest < 0 {
            return Ok(None);
        }
        if self.hits.is_none() {
            self.hits = Some(self.document_hits()?);
        }
        Ok(self.hits.as_mut().and_then(VecDeque::pop_front))
    }

    fn latest_document(&self) -> DocumentId {
        self.latest
    }

    fn close(&mut self) {
        self.pool.close();
        self.queue.clear();
        self.hits = None;
        self.latest = NO_MORE_DOCUMENTS;
    }
}
