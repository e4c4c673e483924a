//! Cache of annotation resolutions
//!
//! Resolving an annotation query against the semantic layer can return tens
//! of thousands of terms. Repeated runs of the same annotation query reuse the
//! resolved list instead of asking the resolver again.

use moka::sync::Cache;
use std::sync::Arc;

use proxima_core::{AnnotationCacheConfig, AnnotationConstraint, AnnotationTerm};

/// Resolved term lists keyed by annotation type and constraints.
///
/// # Cache Strategy
///
/// - **Size limit**: `max_entries` resolutions
/// - **Idle expiry**: entries unused for `time_to_idle_secs` are dropped
pub struct AnnotationCache {
    cache: Cache<String, Arc<Vec<AnnotationTerm>>>,
}

impl AnnotationCache {
    pub fn new(config: &AnnotationCacheConfig) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_idle(config.time_to_idle())
                .build(),
        }
    }

    pub fn get(
        &self,
        annotation_type: &str,
        constraints: &[AnnotationConstraint],
    ) -> Option<Arc<Vec<AnnotationTerm>>> {
        self.cache.get(&cache_key(annotation_type, constraints))
    }

    pub fn put(
        &self,
        annotation_type: &str,
        constraints: &[AnnotationConstraint],
        terms: Arc<Vec<AnnotationTerm>>,
    ) {
        self.cache.insert(cache_key(annotation_type, constraints), terms);
    }

    /// Returns (entry_count, estimated_size)
    pub fn stats(&self) -> (u64, u64) {
        (self.cache.entry_count(), self.cache.weighted_size())
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}

/// Canonical key: the type followed by the JSON form of every constraint.
fn cache_key(annotation_type: &str, constraints: &[AnnotationConstraint]) -> String {
    let constraints = serde_json::to_string(constraints).unwrap_or_default();
    format!("{}\u{0}{}", annotation_type, constraints)
}
