//! Course service: the entry points that tie the aggregators to storage.
//!
//! Every mutating operation is a read-modify-write of one course document.
//! Within a process those cycles are serialized per course id; across
//! processes the conditional write on the document's `_etag` turns a lost
//! update into [`GradingError::RecordConflict`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::instrument;

use crate::assignments::merge_course_assignments;
use crate::attendance::{
    course_attendance, merge_course_attendance, student_attendance_in, CourseAttendanceEntry,
    StudentAttendanceEntry,
};
use crate::classifier::{Classification, GradingSystem};
use crate::error::{GradingError, StoreError};
use crate::model::{AssignmentUpdate, AttendanceUpdate, CourseDocument, GradeType};
use crate::report::GradeReport;
use crate::scoring::score_students;
use crate::traits::{GradeRuleSource, RecordStore};

/// Per-course async write locks, held weakly so idle entries can be dropped.
#[derive(Default)]
struct CourseLocks {
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl CourseLocks {
    const PRUNE_THRESHOLD: usize = 128;

    fn acquire(&self, course_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        if locks.len() > Self::PRUNE_THRESHOLD {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(course_id).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(course_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Grading and roster operations over a record store.
pub struct CourseService {
    store: Arc<dyn RecordStore>,
    rules: Arc<dyn GradeRuleSource>,
    tenant_id: String,
    locks: CourseLocks,
}

impl CourseService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        rules: Arc<dyn GradeRuleSource>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            rules,
            tenant_id: tenant_id.into(),
            locks: CourseLocks::default(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Load and compile the tenant's rule set.
    pub async fn grading_system(&self) -> Result<GradingSystem, GradingError> {
        let definitions = self
            .rules
            .grade_rules(&self.tenant_id)
            .await
            .map_err(|source| GradingError::RulesUnavailable {
                tenant_id: self.tenant_id.clone(),
                source,
            })?;
        GradingSystem::from_definitions(&definitions)
    }

    /// Grade every student in a course.
    ///
    /// Students without a defined percentage are reported in `skipped`; an
    /// invalid rule expression fails the whole call.
    #[instrument(skip(self), fields(tenant = %self.tenant_id))]
    pub async fn classify_course(
        &self,
        course_id: &str,
        grade_type: GradeType,
    ) -> Result<Classification, GradingError> {
        let course = self.store.read_course(course_id).await?;
        self.classify_document(&course, grade_type).await
    }

    /// Classify a course and wrap the outcome in a report snapshot.
    #[instrument(skip(self), fields(tenant = %self.tenant_id))]
    pub async fn grade_report(
        &self,
        course_id: &str,
        grade_type: GradeType,
    ) -> Result<GradeReport, GradingError> {
        let course = self.store.read_course(course_id).await?;
        let classification = self.classify_document(&course, grade_type).await?;
        Ok(GradeReport::new(&course, grade_type, classification))
    }

    async fn classify_document(
        &self,
        course: &CourseDocument,
        grade_type: GradeType,
    ) -> Result<Classification, GradingError> {
        let system = self.grading_system().await?;
        let (scores, skipped) = score_students(&course.students);
        let (graded, cohort) = system.classify(grade_type, &scores);

        tracing::info!(
            course_id = %course.id,
            %grade_type,
            graded = graded.len(),
            skipped = skipped.len(),
            ungraded = graded.iter().filter(|g| g.grade.is_none()).count(),
            "classified course"
        );

        Ok(Classification {
            graded,
            skipped,
            cohort,
        })
    }

    /// Record attendance observations; dates already marked are left alone.
    #[instrument(skip(self, batch), fields(batch = batch.len()))]
    pub async fn merge_attendance(
        &self,
        course_id: &str,
        batch: &[AttendanceUpdate],
    ) -> Result<CourseDocument, GradingError> {
        let (course, stats) = self
            .update_course(course_id, |course| merge_course_attendance(course, batch))
            .await?;

        for student_id in &stats.unknown_students {
            tracing::warn!(course_id, student_id = %student_id, "attendance for unknown student ignored");
        }
        tracing::info!(
            course_id,
            added = stats.added,
            ignored = stats.ignored,
            "merged attendance"
        );
        Ok(course)
    }

    /// Upsert assignment scores by assignment name.
    #[instrument(skip(self, batch), fields(batch = batch.len()))]
    pub async fn merge_assignments(
        &self,
        course_id: &str,
        batch: &[AssignmentUpdate],
    ) -> Result<CourseDocument, GradingError> {
        let (course, stats) = self
            .update_course(course_id, |course| merge_course_assignments(course, batch))
            .await?;

        for student_id in &stats.unknown_students {
            tracing::warn!(course_id, student_id = %student_id, "assignment for unknown student ignored");
        }
        tracing::info!(
            course_id,
            inserted = stats.inserted,
            updated = stats.updated,
            "merged assignments"
        );
        Ok(course)
    }

    /// Attendance of every student in a course, with whole-number percentages.
    #[instrument(skip(self))]
    pub async fn course_attendance_percentages(
        &self,
        course_id: &str,
    ) -> Result<Vec<CourseAttendanceEntry>, GradingError> {
        let course = self.store.read_course(course_id).await?;
        Ok(course_attendance(&course))
    }

    /// One student's attendance across courses, with unrounded percentages.
    ///
    /// Courses that do not exist or do not enrol the student are omitted.
    #[instrument(skip(self, course_ids), fields(courses = course_ids.len()))]
    pub async fn student_attendance(
        &self,
        student_id: &str,
        course_ids: &[String],
    ) -> Result<Vec<StudentAttendanceEntry>, GradingError> {
        let mut entries = Vec::with_capacity(course_ids.len());
        for course_id in course_ids {
            let course = match self.store.read_course(course_id).await {
                Ok(course) => course,
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(course_id = %course_id, "course not found, omitted");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match student_attendance_in(&course, student_id) {
                Some(entry) => entries.push(entry),
                None => tracing::debug!(course_id = %course_id, "student not enrolled, omitted"),
            }
        }
        Ok(entries)
    }

    /// Read, modify and conditionally write one course under its lock.
    async fn update_course<T>(
        &self,
        course_id: &str,
        apply: impl FnOnce(&mut CourseDocument) -> T,
    ) -> Result<(CourseDocument, T), GradingError> {
        let lock = self.locks.acquire(course_id);
        let _guard = lock.lock().await;

        let mut course = self.store.read_course(course_id).await?;
        let outcome = apply(&mut course);
        let stored = self.store.write_course(&course).await?;
        tracing::debug!(course_id, store = self.store.name(), etag = ?stored.etag, "course written");
        Ok((stored, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_are_shared_while_held() {
        let locks = CourseLocks::default();
        let a = locks.acquire("c1");
        let b = locks.acquire("c1");
        assert!(Arc::ptr_eq(&a, &b));
        let other = locks.acquire("c2");
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn dropped_locks_are_pruned() {
        let locks = CourseLocks::default();
        for i in 0..=CourseLocks::PRUNE_THRESHOLD {
            drop(locks.acquire(&format!("c{i}")));
        }
        assert_eq!(locks.len(), CourseLocks::PRUNE_THRESHOLD + 1);

        let held = locks.acquire("kept");
        assert_eq!(locks.len(), 1);
        assert!(Arc::ptr_eq(&held, &locks.acquire("kept")));
    }
}
