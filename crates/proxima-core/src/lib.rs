//! Core types and collaborator traits for the proxima query engine.

pub mod annotation;
pub mod config;
pub mod error;
pub mod ids;
pub mod traits;

pub use annotation::{AnnotationConstraint, AnnotationTerm, ConstraintPredicate};
pub use config::{AnnotationCacheConfig, EngineConfig, QueryConfig, DEFAULT_MAX_LIVE_EXECUTORS};
pub use error::{CoreError, CoreResult};
pub use ids::{is_document, or_exhausted, DocumentId, Position, NO_MORE_DOCUMENTS, UNPOSITIONED};
pub use traits::{IndexReader, PostingIterator, SemanticResolver};
