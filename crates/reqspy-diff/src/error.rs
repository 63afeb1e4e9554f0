//! Error types for the diff crate.

use reqspy_types::TypeError;

/// Errors raised before a comparison can run.
///
/// Trees that differ are not an error: that outcome is a non-empty
/// [`ComparisonResult`](reqspy_types::ComparisonResult).
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The input could not be turned into a node tree.
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// The comparison options were misconfigured.
    #[error("invalid options: {0}")]
    Options(#[from] TypeError),

    /// An element query could not be evaluated.
    #[error("invalid query {query:?}: {reason}")]
    Query { query: String, reason: String },
}

impl DiffError {
    /// Create a query error.
    pub fn query(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Query {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
