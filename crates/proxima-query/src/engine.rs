//! Query engine context: registered indexes, settings and the semantic layer.
//!
//! A [`QueryEngine`] is shared by every query run. It is cheap to clone and
//! safe to use from many threads at once; each run builds its own executor
//! tree with [`QueryEngine::executor`] and drives it single-threaded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use proxima_core::{
    AnnotationConstraint, AnnotationTerm, CoreError, CoreResult, DocumentId, EngineConfig,
    IndexReader, SemanticResolver, NO_MORE_DOCUMENTS,
};

use crate::annotation_cache::AnnotationCache;
use crate::binding::Binding;
use crate::executor::{Executor, QueryExecutor};
use crate::node::QueryNode;

/// Every hit of one matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHits {
    pub document_id: DocumentId,
    pub hits: Vec<Binding>,
}

struct EngineInner {
    indexes: HashMap<String, Arc<dyn IndexReader>>,
    config: EngineConfig,
    resolver: Option<Arc<dyn SemanticResolver>>,
    annotations: AnnotationCache,
}

/// Shared handle to the indexes and settings queries run against.
#[derive(Clone)]
pub struct QueryEngine {
    inner: Arc<EngineInner>,
}

impl QueryEngine {
    pub fn builder() -> QueryEngineBuilder {
        QueryEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn capture_sub_bindings(&self) -> bool {
        self.inner.config.query.capture_sub_bindings
    }

    pub fn max_live_executors(&self) -> usize {
        self.inner.config.query.max_live_executors
    }

    /// Looks up a registered index.
    pub fn index(&self, name: &str) -> CoreResult<Arc<dyn IndexReader>> {
        self.inner
            .indexes
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::configuration(format!("unknown index `{}`", name)))
    }

    pub fn document_size(&self, index: &str, doc_id: DocumentId) -> CoreResult<i32> {
        self.index(index)?.document_size(doc_id)
    }

    /// Terms matching an annotation query, served from the cache when the
    /// same query was resolved before.
    pub fn resolve_annotation(
        &self,
        annotation_type: &str,
        constraints: &[AnnotationConstraint],
    ) -> CoreResult<Arc<Vec<AnnotationTerm>>> {
        let resolver = self.inner.resolver.as_ref().ok_or_else(|| {
            CoreError::configuration(format!(
                "annotation `{}` used without a semantic resolver",
                annotation_type
            ))
        })?;

        if let Some(terms) = self.inner.annotations.get(annotation_type, constraints) {
            debug!(annotation_type, terms = terms.len(), "annotation cache hit");
            return Ok(terms);
        }

        let terms = Arc::new(resolver.resolve(annotation_type, constraints)?);
        self.inner
            .annotations
            .put(annotation_type, constraints, Arc::clone(&terms));
        Ok(terms)
    }

    /// Returns (entry_count, estimated_size) of the annotation cache.
    pub fn annotation_cache_stats(&self) -> (u64, u64) {
        self.inner.annotations.stats()
    }

    /// Validates `node` and builds its executor tree.
    pub fn executor(&self, node: &Arc<QueryNode>) -> CoreResult<Executor> {
        node.validate()?;
        Executor::build(self, node)
    }

    /// Every document matching `node`, ascending.
    pub fn documents(&self, node: &Arc<QueryNode>) -> CoreResult<Vec<DocumentId>> {
        self.drive(node, |_, _| Ok(()))
            .map(|docs| docs.into_iter().map(|d| d.document_id).collect())
    }

    /// Every matching document with all of its hits.
    pub fn search(&self, node: &Arc<QueryNode>) -> CoreResult<Vec<DocumentHits>> {
        self.drive(node, |executor, hits| {
            while let Some(hit) = executor.next_hit()? {
                hits.push(hit);
            }
            Ok(())
        })
    }

    /// Runs `node` to completion, letting `collect` pull hits on each
    /// document. The executor is closed whatever the outcome.
    fn drive<F>(&self, node: &Arc<QueryNode>, mut collect: F) -> CoreResult<Vec<DocumentHits>>
    where
        F: FnMut(&mut Executor, &mut Vec<Binding>) -> CoreResult<()>,
    {
        let mut executor = self.executor(node)?;
        let mut results = Vec::new();

        let outcome: CoreResult<()> = (|| {
            let mut doc = executor.next_document(-1)?;
            while doc != NO_MORE_DOCUMENTS {
                let mut hits = Vec::new();
                collect(&mut executor, &mut hits)?;
                results.push(DocumentHits {
                    document_id: doc,
                    hits,
                });
                doc = executor.next_document(doc)?;
            }
            Ok(())
        })();

        executor.close();
        debug!(query = %node, documents = results.len(), "query run finished");
        outcome.map(|()| results)
    }
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.inner.indexes.keys().collect();
        names.sort();
        f.debug_struct("QueryEngine")
            .field("indexes", &names)
            .field("config", &self.inner.config)
            .field("resolver", &self.inner.resolver.is_some())
            .finish()
    }
}

/// Collects indexes and settings for a [`QueryEngine`].
#[derive(Default)]
pub struct QueryEngineBuilder {
    indexes: HashMap<String, Arc<dyn IndexReader>>,
    config: Option<EngineConfig>,
    resolver: Option<Arc<dyn SemanticResolver>>,
}

impl QueryEngineBuilder {
    /// Registers an index under its own name, replacing any earlier one.
    pub fn with_index(mut self, index: Arc<dyn IndexReader>) -> Self {
        self.indexes.insert(index.name().to_string(), index);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SemanticResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> CoreResult<QueryEngine> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| CoreError::configuration(e.to_string()))?;

        info!(
            indexes = self.indexes.len(),
            max_live_executors = config.query.max_live_executors,
            capture_sub_bindings = config.query.capture_sub_bindings,
            "query engine ready"
        );

        Ok(QueryEngine {
            inner: Arc::new(EngineInner {
                annotations: AnnotationCache::new(&config.annotation_cache),
                indexes: self.indexes,
                config,
                resolver: self.resolver,
            }),
        })
    }
}
