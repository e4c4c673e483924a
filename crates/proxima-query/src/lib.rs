//! Positional query execution for the proxima engine.
//!
//! A query is a tree of [`QueryNode`]s built with the functions in [`node`].
//! [`QueryEngine::executor`] turns a tree into a stateful [`Executor`] that is
//! driven document by document; [`QueryEngine::search`] does this to
//! completion.

mod annotation_cache;
pub mod binding;
pub mod engine;
pub mod executor;
pub mod node;
pub mod pool;

pub use annotation_cache::AnnotationCache;
pub use binding::Binding;
pub use engine::{DocumentHits, QueryEngine, QueryEngineBuilder};
pub use executor::{Executor, OverlapTarget, QueryExecutor};
pub use node::{GapRange, QueryNode};
pub use pool::ExecutorPool;
