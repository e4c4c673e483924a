use std::collections::VecDeque;
use std::sync::Arc;

use proxima_core::{CoreResult, DocumentId, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::chain::ChainMarks;
use super::sequence::chain_binding;
use super::{effective_bound, Executor, QueryExecutor};
use crate::binding::Binding;
use crate::engine::QueryEngine;
use crate::node::{GapRange, QueryNode};

/// Runs of `min..=max` strictly adjacent hits of a single child.
pub struct RepeatsExecutor {
    node: Arc<QueryNode>,
    child: Box<Executor>,
    min: usize,
    max: usize,
    capture: bool,
    latest: DocumentId,
    hits: VecDeque<Binding>,
}

impl RepeatsExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        child: &Arc<QueryNode>,
        min: usize,
        max: usize,
    ) -> CoreResult<Self> {
        Ok(Self {
            node,
            child: Box::new(Executor::build(engine, child)?),
            min,
            max,
            capture: engine.capture_sub_bindings(),
            latest: UNPOSITIONED,
            hits: VecDeque::new(),
        })
    }

    fn document_hits(&mut self, doc: DocumentId) -> CoreResult<VecDeque<Binding>> {
        let run = self.child.drain_hits()?;
        let mut hits = VecDeque::new();
        if run.len() < self.min {
            return Ok(hits);
        }

        // A chain can never be longer than the number of child hits.
        let slots = self.max.min(run.len());
        let marks = ChainMarks::new(
            vec![run.as_slice(); slots],
            vec![GapRange::ADJACENT; slots - 1],
            self.min,
        );
        marks.for_each_chain(|chain| hits.push_back(chain_binding(&self.node, doc, chain, self.capture)));
        Ok(hits)
    }
}

impl QueryExecutor for RepeatsExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let mut bound = effective_bound(self.latest, greater_than);
        self.hits.clear();
        loop {
            let doc = self.child.next_document(bound)?;
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
        self.child.close();
        self.hits.clear();
        self.latest = NO_MORE_DOCUMENTS;
    }
}
