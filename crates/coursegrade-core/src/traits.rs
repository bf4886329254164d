//! Collaborator contracts for course storage and institute configuration.
//!
//! Implemented by the `coursegrade-store` crate; the course service holds
//! them as `Arc<dyn …>` handles.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{CourseDocument, RawGradingRule};

/// Persistent storage of course documents.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable backend name (e.g. "file").
    fn name(&self) -> &str;

    /// Fetch a course document. Unknown ids fail with [`StoreError::NotFound`].
    async fn read_course(&self, course_id: &str) -> Result<CourseDocument, StoreError>;

    /// Replace a course document.
    ///
    /// When `course.etag` is set the write only succeeds if it still matches
    /// the stored token, otherwise it fails with [`StoreError::Conflict`].
    /// Returns the stored document carrying its new token.
    async fn write_course(&self, course: &CourseDocument) -> Result<CourseDocument, StoreError>;
}

/// Source of an institute's grading rules.
#[async_trait]
pub trait GradeRuleSource: Send + Sync {
    /// Ordered raw rule definitions for a tenant.
    async fn grade_rules(&self, tenant_id: &str) -> Result<Vec<RawGradingRule>, StoreError>;
}
