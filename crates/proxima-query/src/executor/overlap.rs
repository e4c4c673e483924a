use std::collections::VecDeque;
use std::sync::Arc;

use proxima_core::{CoreResult, DocumentId, Position, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::{build_children, close_all, effective_bound, intersect, Executor, QueryExecutor};
use crate::binding::{flatten, Binding};
use crate::engine::QueryEngine;
use crate::node::QueryNode;

const INNER: usize = 0;
const OUTER: usize = 1;

/// Which side of an interval-containment test is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapTarget {
    /// `within`: inner hits lying inside some outer hit.
    Inner,
    /// `contains`: outer hits enclosing some inner hit.
    Outer,
}

/// Shared executor for `within` and `contains`.
pub struct OverlapExecutor {
    node: Arc<QueryNode>,
    /// `[inner, outer]`
    children: Vec<Executor>,
    target: OverlapTarget,
    capture: bool,
    latest: DocumentId,
    hits: VecDeque<Binding>,
}

impl OverlapExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        inner: &Arc<QueryNode>,
        outer: &Arc<QueryNode>,
        target: OverlapTarget,
    ) -> CoreResult<Self> {
        Ok(Self {
            node,
            children: build_children(engine, [inner, outer])?,
            target,
            capture: engine.capture_sub_bindings(),
            latest: UNPOSITIONED,
            hits: VecDeque::new(),
        })
    }

    fn document_hits(&mut self) -> CoreResult<VecDeque<Binding>> {
        let inner = self.children[INNER].drain_hits()?;
        let outer = self.children[OUTER].drain_hits()?;

        let pairs = match self.target {
            OverlapTarget::Inner => enclosed(&inner, &outer),
            OverlapTarget::Outer => enclosing(&outer, &inner),
        };

        Ok(pairs
            .into_iter()
            .map(|(target, filter)| {
                let binding = Binding::new(
                    Arc::clone(&self.node),
                    target.document_id(),
                    target.position(),
                    target.length(),
                );
                if self.capture {
                    binding.with_contained(flatten([target, filter]))
                } else {
                    binding
                }
            })
            .collect())
    }
}

/// Pairs every inner hit lying inside an outer hit with the first such outer
/// hit.
fn enclosed<'a>(inner: &'a [Binding], outer: &'a [Binding]) -> Vec<(&'a Binding, &'a Binding)> {
    // prefix_max_end[k]: largest end among outer[..=k]
    let prefix_max_end: Vec<Position> = outer
        .iter()
        .scan(Position::MIN, |max, hit| {
            *max = (*max).max(hit.end());
            Some(*max)
        })
        .collect();

    inner
        .iter()
        .filter_map(|hit| {
            let started = outer.partition_point(|o| o.position() <= hit.position());
            let first = prefix_max_end[..started].partition_point(|&end| end < hit.end());
            (first < started).then(|| (hit, &outer[first]))
        })
        .collect()
}

/// Pairs every outer hit enclosing an inner hit with the first such inner
/// hit.
fn enclosing<'a>(outer: &'a [Binding], inner: &'a [Binding]) -> Vec<(&'a Binding, &'a Binding)> {
    // suffix_min_end[k]: smallest end among inner[k..]
    let mut suffix_min_end = vec![Position::MAX; inner.len() + 1];
    for k in (0..inner.len()).rev() {
        suffix_min_end[k] = suffix_min_end[k + 1].min(inner[k].end());
    }

    outer
        .iter()
        .filter_map(|hit| {
            let from = inner.partition_point(|i| i.position() < hit.position());
            if suffix_min_end[from] > hit.end() {
                return None;
            }
            inner[from..]
                .iter()
                .find(|i| i.end() <= hit.end())
                .map(|i| (hit, i))
        })
        .collect()
}

impl QueryExecutor for OverlapExecutor {
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

            let hits = self.document_hits()?;
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
