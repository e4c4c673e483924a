use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;

use proxima_core::{CoreError, CoreResult, DocumentId, Position, NO_MORE_DOCUMENTS, UNPOSITIONED};

use super::{build_children, close_all, effective_bound, intersect, Executor, QueryExecutor};
use crate::binding::{flatten, Binding};
use crate::engine::QueryEngine;
use crate::node::QueryNode;

/// Documents matched by every child, hit as the minimal intervals covering
/// one hit of each positional child.
///
/// Children that only select documents (`const`) take part in the document
/// intersection but not in the covering computation. Hits are computed on
/// the first `next_hit` of each document.
pub struct AndExecutor {
    node: Arc<QueryNode>,
    children: Vec<Executor>,
    filters: Vec<bool>,
    capture: bool,
    latest: DocumentId,
    hits: Option<VecDeque<Binding>>,
}

impl AndExecutor {
    pub(crate) fn new(
        engine: &QueryEngine,
        node: Arc<QueryNode>,
        children: &[Arc<QueryNode>],
    ) -> CoreResult<Self> {
        Ok(Self {
            filters: children.iter().map(|c| c.is_document_filter()).collect(),
            children: build_children(engine, children)?,
            node,
            capture: engine.capture_sub_bindings(),
            latest: UNPOSITIONED,
            hits: None,
        })
    }

    fn document_hits(&mut self) -> CoreResult<VecDeque<Binding>> {
        let mut lists = Vec::with_capacity(self.children.len());
        for (child, filter) in self.children.iter_mut().zip(&self.filters) {
            if *filter {
                continue;
            }
            let hits = child.drain_hits()?;
            if hits.is_empty() {
                let violation = CoreError::invariant_violation(format!(
                    "and child produced no hits on matched document {}",
                    self.latest
                ));
                warn!(document = self.latest, error = %violation, "dropping and hits");
                return Ok(VecDeque::new());
            }
            lists.push(hits);
        }

        let mut hits = VecDeque::new();
        for cover in minimal_covers(&lists) {
            let binding = Binding::spanning(Arc::clone(&self.node), self.latest, cover.start, cover.end);
            let binding = if self.capture {
                binding.with_contained(flatten(
                    cover.picks.iter().zip(&lists).map(|(&k, list)| &list[k]),
                ))
            } else {
                binding
            };
            hits.push_back(binding);
        }
        Ok(hits)
    }
}

impl QueryExecutor for AndExecutor {
    fn next_document(&mut self, greater_than: DocumentId) -> CoreResult<DocumentId> {
        if self.latest == NO_MORE_DOCUMENTS {
            return Ok(NO_MORE_DOCUMENTS);
        }
        self.hits = None;
        self.latest = intersect(&mut self.children, effective_bound(self.latest, greater_than))?;
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
        close_all(&mut self.children);
        self.hits = None;
        self.latest = NO_MORE_DOCUMENTS;
    }
}

/// One minimal covering interval and the hit chosen from each list.
#[derive(Debug)]
struct Cover {
    start: Position,
    end: Position,
    picks: Vec<usize>,
}

/// Every minimal interval containing at least one hit of each list, by
/// ascending start.
///
/// Lists must be non-empty and sorted by position. For each candidate start
/// `a`, the tightest end reachable using only hits starting at or after `a`
/// is the largest of the per-list minimum ends; shrinking the start to the
/// latest hit that still fits gives the minimal interval anchored there.
/// Both bounds grow with `a`, so a cover is superseded exactly when the next
/// one shares its end.
fn minimal_covers(lists: &[Vec<Binding>]) -> Vec<Cover> {
    let suffix_min_end: Vec<Vec<Position>> = lists
        .iter()
        .map(|list| {
            let mut mins = vec![Position::MAX; list.len() + 1];
            for k in (0..list.len()).rev() {
                mins[k] = mins[k + 1].min(list[k].end());
            }
            mins
        })
        .collect();

    let mut starts: Vec<Position> = lists.iter().flatten().map(Binding::position).collect();
    starts.sort_unstable();
    starts.dedup();

    let mut covers: Vec<Cover> = Vec::new();
    'starts: for anchor in starts {
        let mut end = Position::MIN;
        let mut firsts = Vec::with_capacity(lists.len());
        for (list, mins) in lists.iter().zip(&suffix_min_end) {
            let first = list.partition_point(|h| h.position() < anchor);
            if first == list.len() {
                break 'starts;
            }
            end = end.max(mins[first]);
            firsts.push(first);
        }

        let mut start = Position::MAX;
        let mut picks = Vec::with_capacity(lists.len());
        for (list, &first) in lists.iter().zip(&firsts) {
            // the minimum-end hit guarantees a candidate exists; hits are
            // position ordered, so none starting past `end` can fit
            let pick = (first..list.len())
                .take_while(|&k| list[k].position() <= end)
                .filter(|&k| list[k].end() <= end)
                .max_by_key(|&k| list[k].position())
                .unwrap_or(first);
            start = start.min(list[pick].position());
            picks.push(pick);
        }

        match covers.last_mut() {
            Some(last) if last.end == end => {
                if last.start != start {
                    *last = Cover { start, end, picks };
                }
            }
            _ => covers.push(Cover { start, end, picks }),
        }
    }
    covers
}

#[cfg(test)]
mod tests {
    use super::super::testing::{engine, engine_with, run};
    use super::*;
    use crate::node::{and, constant, minus, phrase, term};
    use proxima_core::{EngineConfig, QueryConfig};

    fn spans(positions: &[(i32, i32)]) -> Vec<Binding> {
        let node = term("body", "x");
        positions.iter().map(|&(p, l)| Binding::new(node.clone(), 0, p, l)).collect()
    }

    fn extents(covers: &[Cover]) -> Vec<(i32, i32)> {
        covers.iter().map(|c| (c.start, c.end - c.start)).collect()
    }

    #[test]
    fn test_minimal_covers_pairs() {
        let a = spans(&[(0, 1), (2, 1)]);
        let b = spans(&[(1, 1)]);
        assert_eq!(extents(&minimal_covers(&[a, b])), vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_minimal_covers_drop_enclosing_windows() {
        let a = spans(&[(0, 1), (4, 1)]);
        let b = spans(&[(5, 1), (9, 1)]);
        let c = spans(&[(3, 1)]);
        // [0, 6) encloses [3, 6) and is not reported
        assert_eq!(extents(&minimal_covers(&[a, b, c])), vec![(3, 3)]);
    }

    #[test]
    fn test_minimal_covers_with_long_hits() {
        let a = spans(&[(0, 5)]);
        let b = spans(&[(1, 1), (3, 1)]);
        assert_eq!(extents(&minimal_covers(&[a, b])), vec![(0, 5)]);
    }

    #[test]
    fn test_minimal_covers_over_long_alternation() {
        let n = 40_000;
        let a = spans(&(0..n).step_by(2).map(|p| (p, 1)).collect::<Vec<_>>());
        let b = spans(&(1..n).step_by(2).map(|p| (p, 1)).collect::<Vec<_>>());
        let covers = minimal_covers(&[a, b]);
        assert_eq!(covers.len(), n as usize - 1);
        assert!(covers
            .iter()
            .enumerate()
            .all(|(i, c)| c.start == i as i32 && c.end == i as i32 + 2));
    }

    #[test]
    fn test_and_reports_minimal_hits() {
        let engine = engine(&["a b a", "a", "b x x a b"]);
        let hits = run(&engine, &and([term("body", "a"), term("body", "b")]));
        assert_eq!(
            hits,
            vec![(0, vec![(0, 2), (1, 2)]), (2, vec![(0, 4), (3, 2)])]
        );
    }

    #[test]
    fn test_and_with_phrase_child() {
        let engine = engine(&["c a b x c"]);
        let hits = run(
            &engine,
            &and([phrase([term("body", "a"), term("body", "b")]), term("body", "c")]),
        );
        assert_eq!(hits, vec![(0, vec![(0, 3), (1, 4)])]);
    }

    #[test]
    fn test_const_child_filters_documents() {
        let engine = engine(&["a b", "a b", "a b"]);
        let hits = run(
            &engine,
            &and([term("body", "a"), constant([1]), term("body", "b")]),
        );
        assert_eq!(hits, vec![(1, vec![(0, 2)])]);
    }

    #[test]
    fn test_only_filters_yield_documents_without_hits() {
        let engine = engine(&["a"]);
        let hits = run(&engine, &and([constant([1, 3, 5]), constant([3, 4, 5])]));
        assert_eq!(hits, vec![(3, vec![]), (5, vec![])]);
    }

    #[test]
    fn test_child_without_hits_keeps_document_with_no_hits() {
        // the minus child matches documents 0 and 1 but has no positions
        let engine = engine(&["a", "a b", "a"]);
        let query = and([
            term("body", "a"),
            minus(constant([0, 1]), term("body", "z")),
        ]);
        assert_eq!(run(&engine, &query), vec![(0, vec![]), (1, vec![])]);
    }

    #[test]
    fn test_capture_records_one_hit_per_child() {
        let config = EngineConfig {
            query: QueryConfig {
                capture_sub_bindings: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = engine_with(&["b a"], config);
        let mut exec = Executor::build(&engine, &and([term("body", "a"), term("body", "b")])).unwrap();
        assert_eq!(exec.next_document(-1).unwrap(), 0);
        let hit = exec.next_hit().unwrap().unwrap();
        let positions: Vec<_> = hit.contained().unwrap().iter().map(Binding::position).collect();
        assert_eq!(positions, vec![1, 0]);
    }
}
