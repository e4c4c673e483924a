use std::collections::VecDeque;
use std::sync::Arc;

use proxima_core::{CoreResult, DocumentId, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::chain::ChainMarks;
use super::{build_children, close_all, effective_bound, intersect, Executor, QueryExecutor};
use crate::binding::{flatten, Binding};
use crate::engine::QueryEngine;
use crate::node::{GapRange, QueryNode};

/// Ordered chaining of children with per-slot gap bounds.
///
/// Chaining is not a merge, so each candidate document's hits are
/// materialized per child before every valid chain is enumerated.
pub struct SequenceExecutor {
    node: Arc<QueryNode>,
    children: Vec<Executor>,
    gaps: Vec<GapRange>,
    capture: bool,
    latest: DocumentId,
    hits: VecDeque<Binding>,
}

impl SequenceExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        children: &[Arc<QueryNode>],
        gaps: Vec<GapRange>,
    ) -> CoreResult<Self> {
        Ok(Self {
            node,
            children: build_children(engine, children)?,
            gaps,
            capture: engine.capture_sub_bindings(),
            latest: UNPOSITIONED,
            hits: VecDeque::new(),
        })
    }

    fn document_hits(&mut self, doc: DocumentId) -> CoreResult<VecDeque<Binding>> {
        let slots = self
            .children
            .iter_mut()
            .map(Executor::drain_hits)
            .collect::<CoreResult<Vec<_>>>()?;

        let marks = ChainMarks::new(
            slots.iter().map(Vec::as_slice).collect(),
            self.gaps.clone(),
            slots.len(),
        );

        let mut hits = VecDeque::new();
        marks.for_each_chain(|chain| hits.push_back(chain_binding(&self.node, doc, chain, self.capture)));
        Ok(hits)
    }
}

/// One binding spanning a chain from its first hit's start to its last
/// hit's end.
pub(crate) fn chain_binding(
    node: &Arc<QueryNode>,
    doc: DocumentId,
    chain: &[&Binding],
    capture: bool,
) -> Binding {
    let start = chain.first().map_or(0, |h| h.position());
    let end = chain.last().map_or(start, |h| h.end());
    let binding = Binding::spanning(Arc::clone(node), doc, start, end);
    if capture {
        binding.with_contained(flatten(chain.iter().copied()))
    } else {
        binding
    }
}

impl QueryExecutor for SequenceExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let mut bound = effective_bound(self.latest, greater_than);
        self.hits.clear();
        loop {
            let doc = intersect(&mut self.children, bound)?;
            if doc == NO_MORE_DOCUMENTS {
                self.latest = NO_MORE_DOCUMENTS;
                return Ok(NO_MORE_DOCUMENTS);
            }

            let hits = self.document_hits(doc)?;
            if !hits.is_empty() {
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
        close_all(&mut self.children);
        self.hits.clear();
        self.latest = NO_MORE_DOCUMENTS;
    }
}
