//! Error types for grading and record-store access.
//!
//! `StoreError` lives here rather than in the adapter crate so that the
//! course service can classify collaborator failures (conflict vs. missing
//! course vs. backend trouble) without string matching.

use thiserror::Error;

/// Errors returned by `CourseService` operations.
#[derive(Debug, Error)]
pub enum GradingError {
    /// A grading rule carries an expression outside the predicate grammar.
    #[error("invalid rule expression for grade '{grade}': {reason} (in `{expression}`)")]
    InvalidRuleExpression {
        grade: String,
        expression: String,
        reason: String,
    },

    /// The requested course document does not exist.
    #[error("course not found: {0}")]
    CourseNotFound(String),

    /// The course document changed between read and write.
    #[error("write conflict on course {0}; re-read the course and retry")]
    RecordConflict(String),

    /// The institute's grading rules could not be loaded.
    #[error("failed to load grading rules for tenant '{tenant_id}'")]
    RulesUnavailable {
        tenant_id: String,
        #[source]
        source: StoreError,
    },

    /// Any other record-store failure.
    #[error(transparent)]
    Store(StoreError),
}

impl GradingError {
    /// Returns `true` if the caller may succeed by repeating the whole
    /// read-modify-write cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            GradingError::RecordConflict(_) => true,
            GradingError::Store(e) | GradingError::RulesUnavailable { source: e, .. } => {
                e.is_transient()
            }
            _ => false,
        }
    }
}

impl From<StoreError> for GradingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => GradingError::CourseNotFound(id),
            StoreError::Conflict { key } => GradingError::RecordConflict(key),
            other => GradingError::Store(other),
        }
    }
}

/// Errors that can occur when talking to a record store or rule source.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists under the key.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The write carried a stale or missing concurrency token.
    #[error("version conflict on record {key}")]
    Conflict { key: String },

    /// The key cannot be used by this store (e.g. path separators).
    #[error("invalid record key: {0}")]
    InvalidKey(String),

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with an error status.
    #[error("store backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// Local filesystem failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be encoded or decoded.
    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl StoreError {
    /// Returns `true` for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_)
                | StoreError::Timeout(_)
                | StoreError::Backend {
                    status: 500..=599,
                    ..
                }
        )
    }
}
