//! In-memory record store and static rule source.
//!
//! Used by tests and by `type = "memory"` configurations; contents live
//! only as long as the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use coursegrade_core::error::StoreError;
use coursegrade_core::model::{CourseDocument, RawGradingRule};
use coursegrade_core::traits::{GradeRuleSource, RecordStore};

use crate::{check_key, new_etag};

/// A record store backed by a map, with etag check-and-swap on write.
#[derive(Default)]
pub struct MemoryStore {
    courses: Mutex<HashMap<String, CourseDocument>>,
    write_count: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with courses.
    pub fn with_courses(courses: impl IntoIterator<Item = CourseDocument>) -> Self {
        let store = Self::new();
        for course in courses {
            store.insert(course);
        }
        store
    }

    /// Insert or replace a course unconditionally, assigning a fresh etag.
    pub fn insert(&self, mut course: CourseDocument) -> CourseDocument {
        course.etag = Some(new_etag());
        self.lock().insert(course.id.clone(), course.clone());
        course
    }

    /// Current stored copy of a course.
    pub fn get(&self, course_id: &str) -> Option<CourseDocument> {
        self.lock().get(course_id).cloned()
    }

    /// Number of successful writes through [`RecordStore::write_course`].
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CourseDocument>> {
        self.courses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_course(&self, course_id: &str) -> Result<CourseDocument, StoreError> {
        check_key(course_id)?;
        self.get(course_id)
            .ok_or_else(|| StoreError::NotFound(course_id.to_string()))
    }

    async fn write_course(&self, course: &CourseDocument) -> Result<CourseDocument, StoreError> {
        check_key(&course.id)?;
        let mut courses = self.lock();

        let current = courses.get(&course.id).and_then(|c| c.etag.as_ref());
        if current != course.etag.as_ref() {
            return Err(StoreError::Conflict {
                key: course.id.clone(),
            });
        }

        let mut stored = course.clone();
        stored.etag = Some(new_etag());
        courses.insert(stored.id.clone(), stored.clone());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }
}

/// A rule source returning the same rule set for every tenant.
pub struct StaticRuleSource {
    rules: Vec<RawGradingRule>,
}

impl StaticRuleSource {
    pub fn new(rules: Vec<RawGradingRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl GradeRuleSource for StaticRuleSource {
    async fn grade_rules(&self, _tenant_id: &str) -> Result<Vec<RawGradingRule>, StoreError> {
        Ok(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegrade_core::model::RuleKind;

    #[tokio::test]
    async fn read_your_writes() {
        let store = MemoryStore::new();
        let stored = store
            .write_course(&CourseDocument::new("c1", "Physics"))
            .await
            .unwrap();
        assert!(stored.etag.is_some());

        let read = store.read_course("c1").await.unwrap();
        assert_eq!(read, stored);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let store = MemoryStore::new();
        let err = store.read_course("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn stale_etag_is_a_conflict() {
        let store = MemoryStore::with_courses([CourseDocument::new("c1", "Physics")]);
        let first = store.read_course("c1").await.unwrap();
        let second = first.clone();

        let mut updated = first;
        updated.name = "Physics I".into();
        store.write_course(&updated).await.unwrap();

        let err = store.write_course(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { key } if key == "c1"));
        assert_eq!(store.get("c1").unwrap().name, "Physics I");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn etag_on_a_missing_course_is_a_conflict() {
        let store = MemoryStore::new();
        let mut course = CourseDocument::new("c1", "Physics");
        course.etag = Some("stale".into());
        let err = store.write_course(&course).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn write_without_etag_over_an_existing_course_is_a_conflict() {
        let store = MemoryStore::with_courses([CourseDocument::new("c1", "Physics")]);
        let mut stripped = store.read_course("c1").await.unwrap();
        stripped.etag = None;
        stripped.name = "Chemistry".into();

        let err = store.write_course(&stripped).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { key } if key == "c1"));
        assert_eq!(store.get("c1").unwrap().name, "Physics");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_keys_are_rejected() {
        let store = MemoryStore::new();
        let err = store.read_course("../etc").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn static_rules_for_any_tenant() {
        let source = StaticRuleSource::new(vec![RawGradingRule {
            grade: "P".into(),
            scale: 1.0,
            absolute_predicate: Some("total_score >= 50".into()),
            relative_predicate: None,
            kind: RuleKind::Calculated,
        }]);
        assert_eq!(source.grade_rules("a").await.unwrap().len(), 1);
        assert_eq!(source.grade_rules("b").await.unwrap()[0].grade, "P");
    }
}
