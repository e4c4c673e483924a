//! Annotation constraint types shared by query nodes and semantic resolvers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied between an annotation feature and a constraint value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ConstraintPredicate {
    /// Returns the operator symbol used in textual renderings.
    pub fn symbol(&self) -> &'static str {
        match self {
            ConstraintPredicate::Eq => "=",
            ConstraintPredicate::Ne => "!=",
            ConstraintPredicate::Lt => "<",
            ConstraintPredicate::Le => "<=",
            ConstraintPredicate::Gt => ">",
            ConstraintPredicate::Ge => ">=",
        }
    }
}

/// A single `feature <predicate> value` restriction on an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationConstraint {
    pub feature: String,
    pub predicate: ConstraintPredicate,
    pub value: Value,
}

impl AnnotationConstraint {
    pub fn new(feature: impl Into<String>, predicate: ConstraintPredicate, value: Value) -> Self {
        Self {
            feature: feature.into(),
            predicate,
            value,
        }
    }

    /// Shorthand for an equality constraint.
    pub fn eq(feature: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(feature, ConstraintPredicate::Eq, value.into())
    }
}

impl fmt::Display for AnnotationConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.feature, self.predicate.symbol(), self.value)
    }
}

/// One term produced by resolving an annotation against the semantic layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationTerm {
    /// Index holding the postings for `term`.
    pub index_name: String,
    pub term: String,
    /// Number of tokens a hit of this term spans.
    pub length: i32,
}
