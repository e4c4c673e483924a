use thiserror::Error;

/// Canonical error type shared by the index and query crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Reading postings or document metadata failed.
    ///
    /// Fatal to the executor call that triggered it; the query engine never
    /// retries at this layer.
    #[error("index `{index}` access failed: {message}")]
    IndexAccess {
        /// Name of the index being read.
        index: String,
        /// Human-readable failure details.
        message: String,
    },

    /// A query tree or engine setting is malformed and was rejected before
    /// any execution took place.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A composite executor observed children disagreeing in a way that
    /// should be impossible.
    ///
    /// Executors log this and degrade to "no hits on this document"; it is
    /// never surfaced from `next_document` or `next_hit`.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// I/O error raised by a file-backed collaborator.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Loading configuration sources failed.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CoreError {
    /// Creates an `IndexAccess` variant.
    #[must_use]
    pub fn index_access(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexAccess {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` variant.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an `InvariantViolation` variant.
    #[must_use]
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Returns true when the error originates from the storage layer.
    #[must_use]
    pub fn is_index_access(&self) -> bool {
        matches!(self, Self::IndexAccess { .. } | Self::IoError(_))
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
