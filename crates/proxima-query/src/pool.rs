//! Bounded pool of child executors for fan-out operators.
//!
//! An `or` produced by annotation expansion can carry tens of thousands of
//! term children. The pool keeps at most `max_live` of them materialized in
//! an LRU list threaded through a slot arena. Each slot records the last
//! document its executor reported and how many hits were consumed there, so
//! an evicted executor can be rebuilt and replayed to the same point. Callers
//! observe the same documents and hits whether or not a slot was evicted.

use std::sync::Arc;

use tracing::{trace, warn};

use proxima_core::{CoreError, CoreResult, DocumentId, NO_MORE_DOCUMENTS, UNPOSITIONED};

use crate::binding::Binding;
use crate::engine::QueryEngine;
use crate::executor::{Executor, QueryExecutor};
use crate::node::QueryNode;

struct Slot {
    executor: Option<Executor>,
    prev: Option<usize>,
    next: Option<usize>,
    /// Last value returned by this slot's `next_document`, kept across
    /// evictions.
    last_document: DocumentId,
    /// Hits returned on `last_document` so far.
    hits_consumed: usize,
}

impl Slot {
    fn new() -> Self {
        Self {
            executor: None,
            prev: None,
            next: None,
            last_document: UNPOSITIONED,
            hits_consumed: 0,
        }
    }
}

/// LRU arena of child executors addressed by slot id.
///
/// Slot ids are the indices of the nodes the pool was built with.
///
/// # Panics
///
/// Methods taking an `id` panic when `id >= self.len()`.
pub struct ExecutorPool {
    engine: QueryEngine,
    nodes: Vec<Arc<QueryNode>>,
    slots: Vec<Slot>,
    /// Most recently used live slot.
    head: Option<usize>,
    /// Least recently used live slot, evicted first.
    tail: Option<usize>,
    live: usize,
    max_live: usize,
    closed: bool,
}

impl ExecutorPool {
    pub fn new(engine: &QueryEngine, nodes: Vec<Arc<QueryNode>>) -> Self {
        Self::with_capacity(engine, nodes, engine.max_live_executors())
    }

    /// Pool keeping at most `max_live` executors open; zero is treated as one.
    pub fn with_capacity(engine: &QueryEngine, nodes: Vec<Arc<QueryNode>>, max_live: usize) -> Self {
        let slots = nodes.iter().map(|_| Slot::new()).collect();
        Self {
            engine: engine.clone(),
            nodes,
            slots,
            head: None,
            tail: None,
            live: 0,
            max_live: max_live.max(1),
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of currently materialized executors.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Last document reported for `id`, whether or not it is live.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a slot of this pool.
    pub fn latest_document(&self, id: usize) -> DocumentId {
        if self.closed {
            return NO_MORE_DOCUMENTS;
        }
        self.slots[id].last_document
    }

    /// Advances slot `id` past `greater_than`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a slot of this pool.
    pub fn next_document(&mut self, id: usize, greater_than: DocumentId) -> CoreResult<DocumentId> {
        let last = self.latest_document(id);
        if last == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let fresh = self.ensure_live(id)?;
        // A rebuilt executor starts unpositioned; never let it rewind.
        let bound = if fresh && last >= 0 {
            greater_than.max(last)
        } else {
            greater_than
        };

        let doc = self.live_executor(id)?.next_document(bound)?;
        let slot = &mut self.slots[id];
        slot.last_document = doc;
        slot.hits_consumed = 0;

        if doc == NO_MORE_DOCUMENTS {
            self.release(id);
        }
        Ok(doc)
    }

    /// Next hit of slot `id` on its current document.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a slot of this pool.
    pub fn next_hit(&mut self, id: usize) -> CoreResult<Option<Binding>> {
        let last = self.latest_document(id);
        if last < 0 {
            return Ok(None);
        }

        if self.ensure_live(id)? && !self.resume(id, last)? {
            return Ok(None);
        }

        let hit = self.live_executor(id)?.next_hit()?;
        if hit.is_some() {
            self.slots[id].hits_consumed += 1;
        }
        Ok(hit)
    }

    /// Closes every live executor. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for slot in &mut self.slots {
            if let Some(mut executor) = slot.executor.take() {
                executor.close();
            }
            slot.prev = None;
            slot.next = None;
        }
        self.head = None;
        self.tail = None;
        self.live = 0;
    }

    /// Replays a rebuilt executor onto `document` and skips the hits already
    /// handed out there. Returns false when the executor no longer lands on
    /// `document`.
    fn resume(&mut self, id: usize, document: DocumentId) -> CoreResult<bool> {
        let consumed = self.slots[id].hits_consumed;
        let executor = self.live_executor(id)?;

        let doc = executor.next_document(document - 1)?;
        if doc != document {
            let violation = CoreError::invariant_violation(format!(
                "slot {} resumed on document {} instead of {}",
                id, doc, document
            ));
            warn!(error = %violation, "dropping remaining hits");
            return Ok(false);
        }

        for _ in 0..consumed {
            if executor.next_hit()?.is_none() {
                break;
            }
        }
        trace!(slot = id, document, skipped = consumed, "resumed executor");
        Ok(true)
    }

    /// Makes `id` the most recently used live slot, building its executor if
    /// needed. Returns true when a new executor was built.
    fn ensure_live(&mut self, id: usize) -> CoreResult<bool> {
        if self.slots[id].executor.is_some() {
            self.touch(id);
            return Ok(false);
        }

        if self.live >= self.max_live {
            if let Some(tail) = self.tail {
                trace!(slot = tail, live = self.live, "evicting executor");
                self.release(tail);
            }
        }

        let executor = Executor::build(&self.engine, &self.nodes[id])?;
        self.slots[id].executor = Some(executor);
        self.push_front(id);
        self.live += 1;
        Ok(true)
    }

    fn live_executor(&mut self, id: usize) -> CoreResult<&mut Executor> {
        self.slots[id]
            .executor
            .as_mut()
            .ok_or_else(|| CoreError::invariant_violation(format!("slot {} is not live", id)))
    }

    /// Unlinks and closes the executor of `id`, keeping its saved state.
    fn release(&mut self, id: usize) {
        if let Some(mut executor) = self.slots[id].executor.take() {
            self.unlink(id);
            executor.close();
            self.live -= 1;
        }
    }

    fn touch(&mut self, id: usize) {
        if self.head != Some(id) {
            self.unlink(id);
            self.push_front(id);
        }
    }

    fn push_front(&mut self, id: usize) {
        self.slots[id].prev = None;
        self.slots[id].next = self.head;
        match self.head {
            Some(head) => self.slots[head].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    fn unlink(&mut self, id: usize) {
        let (prev, next) = (self.slots[id].prev.take(), self.slots[id].next.take());
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::engine;
    use crate::node::term;

    fn drain(pool: &mut ExecutorPool, id: usize) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(hit) = pool.next_hit(id).unwrap() {
            out.push(hit.position());
        }
        out
    }

    #[test]
    fn test_live_executors_are_bounded() {
        let engine = engine(&["a b c", "a b c"]);
        let nodes = vec![term("body", "a"), term("body", "b"), term("body", "c")];
        let mut pool = ExecutorPool::with_capacity(&engine, nodes, 2);

        for id in 0..3 {
            assert_eq!(pool.next_document(id, -1).unwrap(), 0);
            assert!(pool.live() <= 2);
        }
        assert_eq!(pool.live(), 2);
        assert_eq!(pool.latest_document(0), 0);
    }

    #[test]
    fn test_evicted_slot_resumes_document() {
        let engine = engine(&["x a y", "a", "z a"]);
        let nodes = vec![term("body", "a"), term("body", "z")];
        let mut pool = ExecutorPool::with_capacity(&engine, nodes, 1);

        assert_eq!(pool.next_document(0, -1).unwrap(), 0);
        // evicts slot 0
        assert_eq!(pool.next_document(1, -1).unwrap(), 2);
        assert_eq!(drain(&mut pool, 0), vec![1]);
        assert_eq!(pool.next_document(0, 0).unwrap(), 1);
        assert_eq!(pool.next_document(1, 2).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(pool.next_document(0, 1).unwrap(), 2);
        assert_eq!(drain(&mut pool, 0), vec![1]);
    }

    #[test]
    fn test_resume_skips_consumed_hits() {
        let engine = engine(&["a a a b"]);
        let nodes = vec![term("body", "a"), term("body", "b")];
        let mut pool = ExecutorPool::with_capacity(&engine, nodes, 1);

        assert_eq!(pool.next_document(0, -1).unwrap(), 0);
        assert_eq!(pool.next_hit(0).unwrap().unwrap().position(), 0);
        assert_eq!(pool.next_document(1, -1).unwrap(), 0);
        assert_eq!(drain(&mut pool, 0), vec![1, 2]);
    }

    #[test]
    fn test_rebuilt_executor_never_rewinds() {
        let engine = engine(&["a", "b", "a", "a"]);
        let nodes = vec![term("body", "a"), term("body", "b")];
        let mut pool = ExecutorPool::with_capacity(&engine, nodes, 1);

        assert_eq!(pool.next_document(0, 1).unwrap(), 2);
        assert_eq!(pool.next_document(1, -1).unwrap(), 1);
        // bound below the recorded document still moves forward
        assert_eq!(pool.next_document(0, -1).unwrap(), 3);
    }

    #[test]
    fn test_exhausted_slot_releases_executor() {
        let engine = engine(&["a"]);
        let mut pool = ExecutorPool::new(&engine, vec![term("body", "a")]);
        assert_eq!(pool.next_document(0, -1).unwrap(), 0);
        assert_eq!(pool.next_document(0, 0).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.next_document(0, -1).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(pool.next_hit(0).unwrap(), None);
    }

    #[test]
    #[should_panic]
    fn test_unknown_slot_panics() {
        let engine = engine(&["a"]);
        let mut pool = ExecutorPool::new(&engine, vec![term("body", "a")]);
        let _ = pool.next_document(1, -1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let engine = engine(&["a"]);
        let mut pool = ExecutorPool::new(&engine, vec![term("body", "a")]);
        assert_eq!(pool.next_document(0, -1).unwrap(), 0);
        pool.close();
        pool.close();
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.next_document(0, -1).unwrap(), NO_MORE_DOCUMENTS);
        assert_eq!(pool.next_hit(0).unwrap(), None);
    }
}
