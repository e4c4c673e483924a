//! Query tree describing a positional retrieval request.
//!
//! A [`QueryNode`] is pure data: it holds no execution state, so one tree can
//! be executed any number of times, concurrently, by independent executors.
//! Children are shared through `Arc` so that hits can cheaply reference the
//! node that produced them.
//!
//! Supported operators:
//! - `term`: occurrences of one term in one index
//! - `and` / `or`: minimal covering intervals / union of hits
//! - `sequence`: ordered children separated by bounded gaps
//! - `repeats`: adjacent repetitions of one child
//! - `within` / `contains`: interval containment, reporting inner / outer
//! - `minus`: left hits not matched exactly by right
//! - `gap`: widens every hit by a fixed number of tokens
//! - `const`: fixed document set without positional hits
//! - `annotation`: semantic-layer lookup expanded into an OR of terms

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use proxima_core::{AnnotationConstraint, CoreError, CoreResult, DocumentId};

/// Bounds on the number of tokens allowed between two consecutive sequence
/// elements. `GapRange { min: 0, max: 0 }` requires adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GapRange {
    pub min: i32,
    pub max: i32,
}

impl GapRange {
    pub const ADJACENT: GapRange = GapRange { min: 0, max: 0 };

    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

/// Abstract syntax tree of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryNode {
    /// Occurrences of `term` in `index`, each spanning `length` tokens.
    Term {
        index: String,
        term: String,
        length: i32,
    },
    And {
        children: Vec<Arc<QueryNode>>,
    },
    Or {
        children: Vec<Arc<QueryNode>>,
    },
    /// `gaps[i]` constrains the distance between `children[i]` and
    /// `children[i + 1]`.
    Sequence {
        children: Vec<Arc<QueryNode>>,
        gaps: Vec<GapRange>,
    },
    Repeats {
        child: Arc<QueryNode>,
        min: u32,
        max: u32,
    },
    /// Reports `inner` hits lying inside some `outer` hit.
    Within {
        inner: Arc<QueryNode>,
        outer: Arc<QueryNode>,
    },
    /// Reports `outer` hits enclosing some `inner` hit.
    Contains {
        outer: Arc<QueryNode>,
        inner: Arc<QueryNode>,
    },
    Minus {
        left: Arc<QueryNode>,
        right: Arc<QueryNode>,
    },
    Gap {
        child: Arc<QueryNode>,
        length: i32,
    },
    /// Strictly ascending document ids.
    Const {
        document_ids: Vec<DocumentId>,
    },
    Annotation {
        annotation_type: String,
        #[serde(default)]
        constraints: Vec<AnnotationConstraint>,
    },
}

impl QueryNode {
    /// Short operator name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryNode::Term { .. } => "term",
            QueryNode::And { .. } => "and",
            QueryNode::Or { .. } => "or",
            QueryNode::Sequence { .. } => "sequence",
            QueryNode::Repeats { .. } => "repeats",
            QueryNode::Within { .. } => "within",
            QueryNode::Contains { .. } => "contains",
            QueryNode::Minus { .. } => "minus",
            QueryNode::Gap { .. } => "gap",
            QueryNode::Const { .. } => "const",
            QueryNode::Annotation { .. } => "annotation",
        }
    }

    /// True for nodes that select documents but never produce hits.
    pub fn is_document_filter(&self) -> bool {
        matches!(self, QueryNode::Const { .. })
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Arc<QueryNode>> {
        match self {
            QueryNode::And { children }
            | QueryNode::Or { children }
            | QueryNode::Sequence { children, .. } => children.iter().collect(),
            QueryNode::Repeats { child, .. } | QueryNode::Gap { child, .. } => vec![child],
            QueryNode::Within { inner, outer } => vec![inner, outer],
            QueryNode::Contains { outer, inner } => vec![outer, inner],
            QueryNode::Minus { left, right } => vec![left, right],
            QueryNode::Term { .. } | QueryNode::Const { .. } | QueryNode::Annotation { .. } => {
                Vec::new()
            }
        }
    }

    /// Validates the whole tree.
    pub fn validate(&self) -> CoreResult<()> {
        self.check()?;
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }

    /// Validates this node only; children are checked when their own
    /// executors are built.
    pub(crate) fn check(&self) -> CoreResult<()> {
        match self {
            QueryNode::Term { index, term, length } => {
                if index.is_empty() {
                    return Err(CoreError::configuration(format!(
                        "term `{}` has an empty index name",
                        term
                    )));
                }
                if *length < 1 {
                    return Err(CoreError::configuration(format!(
                        "term `{}` length must be >= 1, got {}",
                        term, length
                    )));
                }
            }
            QueryNode::And { children } | QueryNode::Or { children } => {
                if children.is_empty() {
                    return Err(CoreError::configuration(format!(
                        "{} requires at least one child",
                        self.kind()
                    )));
                }
            }
            QueryNode::Sequence { children, gaps } => {
                if children.is_empty() {
                    return Err(CoreError::configuration(
                        "sequence requires at least one child",
                    ));
                }
                if gaps.len() + 1 != children.len() {
                    return Err(CoreError::configuration(format!(
                        "sequence of {} children needs {} gaps, got {}",
                        children.len(),
                        children.len() - 1,
                        gaps.len()
                    )));
                }
                if let Some(bad) = gaps.iter().find(|g| g.min < 0 || g.max < g.min) {
                    return Err(CoreError::configuration(format!(
                        "invalid sequence gap [{}, {}]",
                        bad.min, bad.max
                    )));
                }
            }
            QueryNode::Repeats { min, max, .. } => {
                if *min < 1 || max < min {
                    return Err(CoreError::configuration(format!(
                        "repeats bounds must satisfy 1 <= min <= max, got {{{}, {}}}",
                        min, max
                    )));
                }
            }
            QueryNode::Gap { length, .. } => {
                if *length < 0 {
                    return Err(CoreError::configuration(format!(
                        "gap length must be >= 0, got {}",
                        length
                    )));
                }
            }
            QueryNode::Const { document_ids } => {
                if document_ids.first().is_some_and(|first| *first < 0) {
                    return Err(CoreError::configuration(
                        "const document ids must be non-negative",
                    ));
                }
                if document_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(CoreError::configuration(
                        "const document ids must be strictly ascending",
                    ));
                }
            }
            QueryNode::Annotation {
                annotation_type, ..
            } => {
                if annotation_type.is_empty() {
                    return Err(CoreError::configuration(
                        "annotation type must not be empty",
                    ));
                }
            }
            QueryNode::Within { .. } | QueryNode::Contains { .. } | QueryNode::Minus { .. } => {}
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, children: &[Arc<QueryNode>]) -> fmt::Result {
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", child)?;
    }
    Ok(())
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term { index, term, length } => {
                write!(f, "{}:{:?}", index, term)?;
                if *length != 1 {
                    write!(f, "/{}", length)?;
                }
                Ok(())
            }
            QueryNode::And { children } => {
                write!(f, "AND(")?;
                write_list(f, children)?;
                write!(f, ")")
            }
            QueryNode::Or { children } => {
                write!(f, "OR(")?;
                write_list(f, children)?;
                write!(f, ")")
            }
            QueryNode::Sequence { children, gaps } => {
                write!(f, "SEQ(")?;
                for (idx, child) in children.iter().enumerate() {
                    if let Some(gap) = idx.checked_sub(1).and_then(|g| gaps.get(g)) {
                        write!(f, " [{},{}] ", gap.min, gap.max)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            QueryNode::Repeats { child, min, max } => {
                write!(f, "REPEATS({}){{{},{}}}", child, min, max)
            }
            QueryNode::Within { inner, outer } => write!(f, "WITHIN({}, {})", inner, outer),
            QueryNode::Contains { outer, inner } => write!(f, "CONTAINS({}, {})", outer, inner),
            QueryNode::Minus { left, right } => write!(f, "MINUS({}, {})", left, right),
            QueryNode::Gap { child, length } => write!(f, "GAP({}, +{})", child, length),
            QueryNode::Const { document_ids } => write!(f, "CONST{:?}", document_ids),
            QueryNode::Annotation {
                annotation_type,
                constraints,
            } => {
                write!(f, "{{{}", annotation_type)?;
                for constraint in constraints {
                    write!(f, " {}", constraint)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Occurrences of a single-token term.
pub fn term(index: impl Into<String>, term: impl Into<String>) -> Arc<QueryNode> {
    term_with_length(index, term, 1)
}

/// Occurrences of a term whose hits span `length` tokens.
pub fn term_with_length(
    index: impl Into<String>,
    term: impl Into<String>,
    length: i32,
) -> Arc<QueryNode> {
    Arc::new(QueryNode::Term {
        index: index.into(),
        term: term.into(),
        length,
    })
}

pub fn and(children: impl IntoIterator<Item = Arc<QueryNode>>) -> Arc<QueryNode> {
    Arc::new(QueryNode::And {
        children: children.into_iter().collect(),
    })
}

pub fn or(children: impl IntoIterator<Item = Arc<QueryNode>>) -> Arc<QueryNode> {
    Arc::new(QueryNode::Or {
        children: children.into_iter().collect(),
    })
}

pub fn sequence(
    children: impl IntoIterator<Item = Arc<QueryNode>>,
    gaps: impl IntoIterator<Item = GapRange>,
) -> Arc<QueryNode> {
    Arc::new(QueryNode::Sequence {
        children: children.into_iter().collect(),
        gaps: gaps.into_iter().collect(),
    })
}

/// Sequence whose children must be strictly adjacent.
pub fn phrase(children: impl IntoIterator<Item = Arc<QueryNode>>) -> Arc<QueryNode> {
    let children: Vec<_> = children.into_iter().collect();
    let gaps = vec![GapRange::ADJACENT; children.len().saturating_sub(1)];
    Arc::new(QueryNode::Sequence { children, gaps })
}

pub fn repeats(child: Arc<QueryNode>, min: u32, max: u32) -> Arc<QueryNode> {
    Arc::new(QueryNode::Repeats { child, min, max })
}

pub fn within(inner: Arc<QueryNode>, outer: Arc<QueryNode>) -> Arc<QueryNode> {
    Arc::new(QueryNode::Within { inner, outer })
}

pub fn contains(outer: Arc<QueryNode>, inner: Arc<QueryNode>) -> Arc<QueryNode> {
    Arc::new(QueryNode::Contains { outer, inner })
}

pub fn minus(left: Arc<QueryNode>, right: Arc<QueryNode>) -> Arc<QueryNode> {
    Arc::new(QueryNode::Minus { left, right })
}

pub fn gap(child: Arc<QueryNode>, length: i32) -> Arc<QueryNode> {
    Arc::new(QueryNode::Gap { child, length })
}

pub fn constant(document_ids: impl IntoIterator<Item = DocumentId>) -> Arc<QueryNode> {
    Arc::new(QueryNode::Const {
        document_ids: document_ids.into_iter().collect(),
    })
}

pub fn annotation(
    annotation_type: impl Into<String>,
    constraints: impl IntoIterator<Item = AnnotationConstraint>,
) -> Arc<QueryNode> {
    Arc::new(QueryNode::Annotation {
        annotation_type: annotation_type.into(),
        constraints: constraints.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_well_formed_tree() {
        let query = minus(
            within(
                phrase([term("body", "the"), term("body", "cat")]),
                repeats(term("body", "x"), 1, 3),
            ),
            constant([1, 4, 9]),
        );
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_sequence_gap_count_mismatch() {
        let query = sequence([term("body", "a"), term("body", "b")], []);
        let err = query.validate().unwrap_err();
        assert!(err.to_string().contains("needs 1 gaps"));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(repeats(term("body", "a"), 3, 2).validate().is_err());
        assert!(repeats(term("body", "a"), 0, 2).validate().is_err());
        assert!(sequence([term("b", "a"), term("b", "c")], [GapRange::new(2, 1)])
            .validate()
            .is_err());
        assert!(gap(term("body", "a"), -1).validate().is_err());
        assert!(term_with_length("body", "a", 0).validate().is_err());
        assert!(and([]).validate().is_err());
        assert!(or([]).validate().is_err());
    }

    #[test]
    fn test_const_must_be_strictly_ascending() {
        assert!(constant([1, 2, 2]).validate().is_err());
        assert!(constant([3, 1]).validate().is_err());
        assert!(constant([-1, 2]).validate().is_err());
        assert!(constant([]).validate().is_ok());
    }

    #[test]
    fn test_nested_error_is_found() {
        let query = or([term("body", "a"), and([repeats(term("body", "b"), 2, 1)])]);
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_display() {
        let query = sequence(
            [term("body", "the"), term_with_length("body", "new york", 2)],
            [GapRange::new(0, 2)],
        );
        assert_eq!(query.to_string(), "SEQ(body:\"the\" [0,2] body:\"new york\"/2)");
    }

    #[test]
    fn test_serde_value_tree() {
        let query = within(term("body", "cat"), constant([2]));
        let value = serde_json::to_value(query.as_ref()).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "within",
                "inner": {"op": "term", "index": "body", "term": "cat", "length": 1},
                "outer": {"op": "const", "document_ids": [2]}
            })
        );

        let decoded: QueryNode = serde_json::from_value(value).unwrap();
        assert_eq!(&decoded, query.as_ref());
    }

    #[test]
    fn test_document_filter_flag() {
        assert!(constant([1]).is_document_filter());
        assert!(!term("body", "a").is_document_filter());
    }
}
