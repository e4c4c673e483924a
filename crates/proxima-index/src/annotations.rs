//! In-memory semantic layer mapping annotation constraints to index terms.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use proxima_core::{
    AnnotationConstraint, AnnotationTerm, ConstraintPredicate, CoreError, CoreResult,
    SemanticResolver,
};

#[derive(Debug, Clone)]
struct AnnotationEntry {
    features: Map<String, Value>,
    term: AnnotationTerm,
}

/// Registry of annotation instances, each bound to the term that encodes it.
///
/// An annotation such as `Person{gender: "female"}` is stored in the index as
/// an opaque term; resolving a query for `Person` with `gender = female`
/// returns every such term so the engine can OR their postings together.
#[derive(Default)]
pub struct AnnotationTable {
    entries: RwLock<HashMap<String, Vec<AnnotationEntry>>>,
}

impl AnnotationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one annotation instance.
    ///
    /// `features` must be a JSON object; a term registered twice for the same
    /// type is resolved once.
    pub fn register(
        &self,
        annotation_type: impl Into<String>,
        features: Value,
        term: AnnotationTerm,
    ) -> CoreResult<()> {
        let features = match features {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(CoreError::configuration(format!(
                    "annotation features must be an object, found {}",
                    other
                )))
            }
        };

        if term.length < 1 {
            return Err(CoreError::configuration(format!(
                "annotation term `{}` must span at least one token",
                term.term
            )));
        }

        self.entries
            .write()
            .entry(annotation_type.into())
            .or_default()
            .push(AnnotationEntry { features, term });
        Ok(())
    }

    /// Returns the number of registered annotation types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.entries.read().len()
    }
}

impl SemanticResolver for AnnotationTable {
    fn resolve(
        &self,
        annotation_type: &str,
        constraints: &[AnnotationConstraint],
    ) -> CoreResult<Vec<AnnotationTerm>> {
        let entries = self.entries.read();
        let Some(candidates) = entries.get(annotation_type) else {
            return Ok(Vec::new());
        };

        let mut seen: HashSet<&AnnotationTerm> = HashSet::new();
        let mut terms: Vec<AnnotationTerm> = Vec::new();
        for entry in candidates {
            let matches = constraints
                .iter()
                .all(|constraint| satisfies(&entry.features, constraint));
            if matches && seen.insert(&entry.term) {
                terms.push(entry.term.clone());
            }
        }
        Ok(terms)
    }
}

fn satisfies(features: &Map<String, Value>, constraint: &AnnotationConstraint) -> bool {
    let Some(actual) = features.get(&constraint.feature) else {
        return false;
    };

    match constraint.predicate {
        ConstraintPredicate::Eq => values_equal(actual, &constraint.value),
        ConstraintPredicate::Ne => !values_equal(actual, &constraint.value),
        ConstraintPredicate::Lt => compare(actual, &constraint.value) == Some(Ordering::Less),
        ConstraintPredicate::Le => matches!(
            compare(actual, &constraint.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConstraintPredicate::Gt => compare(actual, &constraint.value) == Some(Ordering::Greater),
        ConstraintPredicate::Ge => matches!(
            compare(actual, &constraint.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        // 1 and 1.0 are the same feature value
        (Value::Number(_), Value::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
