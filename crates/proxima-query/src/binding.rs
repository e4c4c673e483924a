//! Hits produced by executors.

use std::cmp::Ordering;
use std::sync::Arc;

use proxima_core::{DocumentId, Position};

use crate::node::QueryNode;

/// A single match: the interval `[position, position + length)` of one
/// document, attributed to the query node that produced it.
///
/// Bindings are immutable once built. Ordering and equality consider only
/// `(document_id, position, length)`.
#[derive(Debug, Clone)]
pub struct Binding {
    node: Arc<QueryNode>,
    document_id: DocumentId,
    position: Position,
    length: i32,
    contained: Option<Vec<Binding>>,
}

impl Binding {
    pub fn new(node: Arc<QueryNode>, document_id: DocumentId, position: Position, length: i32) -> Self {
        Self {
            node,
            document_id,
            position,
            length,
            contained: None,
        }
    }

    /// Builds a binding over an explicit `[start, end)` interval.
    pub(crate) fn spanning(node: Arc<QueryNode>, document_id: DocumentId, start: Position, end: Position) -> Self {
        Self::new(node, document_id, start, end - start)
    }

    /// Attaches already-flattened sub-bindings.
    #[must_use]
    pub fn with_contained(mut self, contained: Vec<Binding>) -> Self {
        self.contained = Some(contained);
        self
    }

    pub fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    /// Exclusive end of the matched interval.
    pub fn end(&self) -> Position {
        self.position + self.length
    }

    /// Every binding of the sub-tree that contributed to this one, flattened.
    pub fn contained(&self) -> Option<&[Binding]> {
        self.contained.as_deref()
    }

    /// True when both bindings cover the same interval.
    pub fn same_extent(&self, other: &Binding) -> bool {
        self.position == other.position && self.length == other.length
    }

    /// True when `other` lies entirely inside this binding's interval.
    pub fn encloses(&self, other: &Binding) -> bool {
        self.position <= other.position && other.end() <= self.end()
    }

    /// Appends this binding, without its sub-bindings, followed by its
    /// already-flattened sub-bindings.
    pub(crate) fn flatten_into(&self, out: &mut Vec<Binding>) {
        out.push(self.clone_shallow());
        if let Some(contained) = &self.contained {
            out.extend(contained.iter().cloned());
        }
    }

    fn clone_shallow(&self) -> Binding {
        Binding {
            node: Arc::clone(&self.node),
            document_id: self.document_id,
            position: self.position,
            length: self.length,
            contained: None,
        }
    }

    fn key(&self) -> (DocumentId, Position, i32) {
        (self.document_id, self.position, self.length)
    }
}

/// Flattens the contributing bindings of a composite hit.
pub(crate) fn flatten<'a>(parts: impl IntoIterator<Item = &'a Binding>) -> Vec<Binding> {
    let mut out = Vec::new();
    for part in parts {
        part.flatten_into(&mut out);
    }
    out
}

/// Re-attributes `child` to `node`, keeping or widening its extent.
pub(crate) fn rewrap(node: &Arc<QueryNode>, child: &Binding, length: i32, capture: bool) -> Binding {
    let binding = Binding::new(Arc::clone(node), child.document_id, child.position, length);
    if capture {
        binding.with_contained(flatten([child]))
    } else {
        binding
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Binding {}

impl PartialOrd for Binding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Binding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{and, term};

    #[test]
    fn test_ordering_by_document_position_length() {
        let node = term("body", "a");
        let mut hits = vec![
            Binding::new(node.clone(), 2, 0, 1),
            Binding::new(node.clone(), 1, 5, 2),
            Binding::new(node.clone(), 1, 5, 1),
            Binding::new(node.clone(), 1, 3, 4),
        ];
        hits.sort();
        let keys: Vec<_> = hits.iter().map(|h| (h.document_id(), h.position(), h.length())).collect();
        assert_eq!(keys, vec![(1, 3, 4), (1, 5, 1), (1, 5, 2), (2, 0, 1)]);
    }

    #[test]
    fn test_flatten_keeps_whole_subtree() {
        let leaf = term("body", "a");
        let parent = and([leaf.clone()]);
        let inner = Binding::new(leaf.clone(), 0, 1, 1);
        let middle = Binding::new(parent.clone(), 0, 1, 1).with_contained(flatten([&inner]));
        let top = rewrap(&parent, &middle, 3, true);

        let contained = top.contained().unwrap();
        assert_eq!(contained.len(), 2);
        assert!(contained.iter().all(|b| b.contained().is_none()));
        assert_eq!(top.length(), 3);
        assert_eq!(top.end(), 4);
    }

    #[test]
    fn test_encloses() {
        let node = term("body", "a");
        let outer = Binding::new(node.clone(), 0, 2, 5);
        assert!(outer.encloses(&Binding::new(node.clone(), 0, 2, 5)));
        assert!(outer.encloses(&Binding::new(node.clone(), 0, 3, 1)));
        assert!(!outer.encloses(&Binding::new(node.clone(), 0, 6, 2)));
        assert!(!outer.encloses(&Binding::new(node, 0, 1, 2)));
    }
}
