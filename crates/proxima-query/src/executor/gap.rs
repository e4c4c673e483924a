use std::sync::Arc;

use proxima_core::{CoreError, CoreResult, DocumentId};

use super::{Executor, QueryExecutor};
use crate::binding::{rewrap, Binding};
use crate::engine::QueryEngine;
use crate::node::QueryNode;

/// Passes documents through and widens every hit by a fixed length.
pub struct GapExecutor {
    node: Arc<QueryNode>,
    child: Box<Executor>,
    length: i32,
    capture: bool,
}

impl GapExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        child: &Arc<QueryNode>,
        length: i32,
    ) -> CoreResult<Self> {
        Ok(Self {
            node,
            child: Box::new(Executor::build(engine, child)?),
            length,
            capture: engine.capture_sub_bindings(),
        })
    }
}

impl QueryExecutor for GapExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        self.child.next_document(greater_than)
    }

    fn next_hit(&mut self) -> CoreResult<Option<Binding>> {
        let Some(hit) = self.child.next_hit()? else {
            return Ok(None);
        };
        if hit.end().checked_add(self.length).is_none() {
            return Err(CoreError::configuration(format!(
                "gap of {} past position {} exceeds the position range",
                self.length,
                hit.end()
            )));
        }
        Ok(Some(rewrap(
            &self.node,
            &hit,
            hit.length() + self.length,
            self.capture,
        )))
    }

    fn latest_document(&self) -> DocumentId {
        self.child.latest_document()
    }

    fn close(&mut self) {
        self.child.close();
    }
}
