//! Stateful, forward-only executors realizing each query operator.
//!
//! Every executor is driven document-at-a-time with two calls:
//! 1. [`QueryExecutor::next_document`] advances to the first matching
//!    document strictly greater than a bound
//! 2. [`QueryExecutor::next_hit`] drains that document's hits in
//!    non-decreasing position order
//!
//! Composite executors drive their children with the same protocol. Document
//! ids never decrease; once [`NO_MORE_DOCUMENTS`] is returned every later
//! call returns it again.

mod and;
mod chain;
mod constant;
mod gap;
mod minus;
mod or;
mod overlap;
mod repeats;
mod sequence;
mod term;

use std::sync::Arc;

use tracing::debug;

use proxima_core::{CoreResult, DocumentId, NO_MORE_DOCUMENTS};

use crate::binding::Binding;
use crate::engine::QueryEngine;
use crate::node::QueryNode;

pub use and::AndExecutor;
pub use constant::ConstExecutor;
pub use gap::GapExecutor;
pub use minus::MinusExecutor;
pub use or::OrExecutor;
pub use overlap::{OverlapExecutor, OverlapTarget};
pub use repeats::RepeatsExecutor;
pub use sequence::SequenceExecutor;
pub use term::TermExecutor;

/// Per-run execution state of one query node.
///
/// Executors are single-threaded: one query run constructs, drives and
/// closes them.
pub trait QueryExecutor {
    /// Advances to the first matching document `> greater_than` and returns
    /// it, or [`NO_MORE_DOCUMENTS`]. Never rewinds: once positioned, the
    /// effective bound is `max(greater_than, latest_document())`.
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId>;

    /// Returns the next hit on the current document, or `None` once that
    /// document's hits are exhausted.
    fn next_hit(&mut self) -> CoreResult<Option<Binding>>;

    /// Last value returned by `next_document`; `UNPOSITIONED` before the
    /// first call.
    fn latest_document(&self) -> DocumentId;

    /// Releases held resources and propagates to every child. Idempotent;
    /// afterwards the executor behaves as exhausted.
    fn close(&mut self);
}

/// Tagged executor variant, one per operator.
pub enum Executor {
    Term(TermExecutor),
    And(AndExecutor),
    Or(OrExecutor),
    Sequence(SequenceExecutor),
    Repeats(RepeatsExecutor),
    Overlap(OverlapExecutor),
    Minus(MinusExecutor),
    Gap(GapExecutor),
    Const(ConstExecutor),
}

macro_rules! dispatch {
    ($self:ident, $exec:ident => $body:expr) => {
        match $self {
            Executor::Term($exec) => $body,
            Executor::And($exec) => $body,
            Executor::Or($exec) => $body,
            Executor::Sequence($exec) => $body,
            Executor::Repeats($exec) => $body,
            Executor::Overlap($exec) => $body,
            Executor::Minus($exec) => $body,
            Executor::Gap($exec) => $body,
            Executor::Const($exec) => $body,
        }
    };
}

impl Executor {
    /// Validates `node` and builds the executor tree for it.
    pub fn build(engine: &QueryEngine, node: &Arc<QueryNode>) -> CoreResult<Executor> {
        node.check()?;
        debug!(op = node.kind(), "building executor");

        let executor = match node.as_ref() {
            QueryNode::Term { .. } => Executor::Term(TermExecutor::new(engine, Arc::clone(node))?),
            QueryNode::And { children } => {
                Executor::And(AndExecutor::new(engine, Arc::clone(node), children)?)
            }
            QueryNode::Or { children } => Executor::Or(OrExecutor::new(
                engine,
                Arc::clone(node),
                children.clone(),
            )?),
            QueryNode::Sequence { children, gaps } => Executor::Sequence(SequenceExecutor::new(
                engine,
                Arc::clone(node),
                children,
                gaps.clone(),
            )?),
            QueryNode::Repeats { child, min, max } => Executor::Repeats(RepeatsExecutor::new(
                engine,
                Arc::clone(node),
                child,
                *min as usize,
                *max as usize,
            )?),
            QueryNode::Within { inner, outer } => Executor::Overlap(OverlapExecutor::new(
                engine,
                Arc::clone(node),
                inner,
                outer,
                OverlapTarget::Inner,
            )?),
            QueryNode::Contains { outer, inner } => Executor::Overlap(OverlapExecutor::new(
                engine,
                Arc::clone(node),
                inner,
                outer,
                OverlapTarget::Outer,
            )?),
            QueryNode::Minus { left, right } => {
                Executor::Minus(MinusExecutor::new(engine, Arc::clone(node), left, right)?)
            }
            QueryNode::Gap { child, length } => Executor::Gap(GapExecutor::new(
                engine,
                Arc::clone(node),
                child,
                *length,
            )?),
            QueryNode::Const { document_ids } => {
                Executor::Const(ConstExecutor::new(document_ids.clone()))
            }
            QueryNode::Annotation {
                annotation_type,
                constraints,
            } => {
                let terms = engine.resolve_annotation(annotation_type, constraints)?;
                debug!(
                    annotation_type = %annotation_type,
                    terms = terms.len(),
                    "annotation resolved"
                );
                let children = terms
                    .iter()
                    .map(|t| {
                        Arc::new(QueryNode::Term {
                            index: t.index_name.clone(),
                            term: t.term.clone(),
                            length: t.length,
                        })
                    })
                    .collect();
                Executor::Or(OrExecutor::new(engine, Arc::clone(node), children)?)
            }
        };
        Ok(executor)
    }

    /// Positions on the first document `>= target`, leaving the executor
    /// untouched when it already sits there or beyond.
    pub(crate) fn advance_to(&mut self, target: DocumentId) -> CoreResult<DocumentId> {
        let latest = self.latest_document();
        if latest == NO_MORE_DOCUMENTS || latest >= target {
            return Ok(latest);
        }
        self.next_document(target - 1)
    }

    /// Collects every remaining hit on the current document.
    pub(crate) fn drain_hits(&mut self) -> CoreResult<Vec<Binding>> {
        let mut hits = Vec::new();
        while let Some(hit) = self.next_hit()? {
            hits.push(hit);
        }
        Ok(hits)
    }
}

impl QueryExecutor for Executor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        dispatch!(self, exec => exec.next_document(greater_than))
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        dispatch!(self, exec => exec.next_hit())
    }

    fn latest_document(&self) -> DocumentId {
        dispatch!(self, exec => exec.latest_document())
    }

    fn close(&mut self) {
        dispatch!(self, exec => exec.close())
    }
}

/// Effective exclusive bound for an executor currently at `latest`.
pub(crate) fn effective_bound(latest: DocumentId, greater_than: DocumentId) -> DocumentId {
    if latest >= 0 {
        greater_than.max(latest)
    } else {
        greater_than
    }
}

/// Advances every child to the first document `> greater_than` on which all
/// of them agree.
pub(crate) fn intersect(children: &mut [Executor], greater_than: DocumentId) -> CoreResult<DocumentId> {
    let mut target = greater_than.saturating_add(1).max(0);
    'search: loop {
        for child in children.iter_mut() {
            let doc = child.advance_to(target)?;
            if doc == NO_MORE_DOCUMENTS {
                return Ok(NO_MORE_DOCUMENTS);
            }
            if doc > target {
                target = doc;
                continue 'search;
            }
        }
        return Ok(target);
    }
}

/// Builds one executor per child node.
pub(crate) fn build_children<'a>(
    engine: &QueryEngine,
    children: impl IntoIterator<Item = &'a Arc<QueryNode>>,
) -> CoreResult<Vec<Executor>> {
    children
        .into_iter()
        .map(|child| Executor::build(engine, child))
        .collect()
}

/// Closes every child.
pub(crate) fn close_all(children: &mut [Executor]) {
    for child in children.iter_mut() {
        child.close();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use proxima_index::MemoryIndex;

    use super::{Executor, QueryExecutor};
    use crate::engine::QueryEngine;
    use crate::node::QueryNode;
    use proxima_core::{DocumentId, EngineConfig, Position};

    /// Engine over a single `body` index built from whitespace-separated texts.
    pub fn engine(texts: &[&str]) -> QueryEngine {
        engine_with(texts, EngineConfig::default())
    }

    pub fn engine_with(texts: &[&str], config: EngineConfig) -> QueryEngine {
        let index = MemoryIndex::new("body");
        for text in texts {
            index.add_text(text);
        }
        QueryEngine::builder()
            .with_index(Arc::new(index))
            .with_config(config)
            .build()
            .unwrap()
    }

    /// `(document, [(position, length)])` for every matching document.
    pub fn run(engine: &QueryEngine, node: &Arc<QueryNode>) -> Vec<(DocumentId, Vec<(Position, i32)>)> {
        let mut executor = Executor::build(engine, node).unwrap();
        let mut out = Vec::new();
        let mut doc = executor.next_document(-1).unwrap();
        while doc >= 0 {
            let mut hits = Vec::new();
            while let Some(hit) = executor.next_hit().unwrap() {
                assert_eq!(hit.document_id(), doc);
                hits.push((hit.position(), hit.length()));
            }
            out.push((doc, hits));
            doc = executor.next_document(doc).unwrap();
        }
        executor.close();
        out
    }
}
