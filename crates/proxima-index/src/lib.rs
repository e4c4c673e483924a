//! Posting sources for the proxima query engine.
//!
//! This crate provides in-memory implementations of the storage and semantic
//! collaborator traits defined in `proxima-core`:
//! - `MemoryIndex`: positional inverted index with logical deletes
//! - `AnnotationTable`: annotation-constraint to term resolution

mod annotations;
mod memory;

pub use annotations::AnnotationTable;
pub use memory::MemoryIndex;
